//! Build script for the storefront crate.
//!
//! Fingerprints the stylesheet and the storefront script so templates can
//! reference `main.<hash>.css` / `app.<hash>.js` and the files can be cached
//! forever.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Assets to fingerprint: (path under `static/`, env var, derived dir).
const ASSETS: &[(&str, &str, &str)] = &[
    ("css/main.css", "CSS_HASH", "css/derived"),
    ("js/app.js", "JS_HASH", "js/derived"),
];

fn main() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let static_dir = Path::new(&manifest_dir).join("static");

    for (source, var, derived) in ASSETS {
        fingerprint(&static_dir, source, var, derived);
    }
}

/// Hash `source` and copy it next to itself as `<stem>.<hash>.<ext>` in
/// `derived`. Sets `var` to the 8-character hash (empty if the file is missing).
fn fingerprint(static_dir: &Path, source: &str, var: &str, derived: &str) {
    let path = static_dir.join(source);
    println!("cargo:rerun-if-changed={}", path.display());

    let content = match fs::read(&path) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read {source}: {e}");
            println!("cargo:rustc-env={var}=");
            return;
        }
    };

    let hash = format!("{:x}", Sha256::digest(&content));
    let short_hash = &hash[..8];
    println!("cargo:rustc-env={var}={short_hash}");

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .expect("asset file name is valid UTF-8");
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .expect("asset has an extension");

    let derived_dir = static_dir.join(derived);
    fs::create_dir_all(&derived_dir).expect("Failed to create derived asset directory");
    fs::copy(&path, derived_dir.join(format!("{stem}.{short_hash}.{ext}")))
        .expect("Failed to copy asset to derived directory");
}
