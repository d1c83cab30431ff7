use std::path::PathBuf;

use anyhow::Context;
use db::models::{
    image::Image,
    pod::{Pod, PodWithImages, UpdatePod},
};
use ts_rs::TS;
use utils_core::response::ApiResponse;

const DEFAULT_OUTPUT: &str = "shared/types.ts";

fn declarations() -> Vec<String> {
    vec![
        Pod::decl(),
        PodWithImages::decl(),
        Image::decl(),
        UpdatePod::decl(),
        ApiResponse::<()>::decl(),
    ]
}

fn render() -> String {
    let mut out = String::from(
        "// This file was generated by `cargo run --bin generate_types`. Do not edit.\n\n",
    );
    for decl in declarations() {
        out.push_str("export ");
        out.push_str(&decl);
        out.push_str("\n\n");
    }
    out
}

fn main() -> anyhow::Result<()> {
    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(&output, render()).with_context(|| format!("writing {}", output.display()))?;

    println!("Wrote TypeScript types to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::render;

    #[test]
    fn exports_every_wire_type() {
        let ts = render();
        for name in ["Pod", "PodWithImages", "Image", "UpdatePod", "ApiResponse"] {
            assert!(ts.contains(&format!("export type {name}")), "{name} missing");
        }
    }
}
