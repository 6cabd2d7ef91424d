//! Output directory placeholder rewriting.
//!
//! Build configurations are shared between deployments, so their declared
//! output directory may contain [`BUNDLE_DIR_TOKEN`]. The requesting party
//! supplies the real root with every request and it is substituted on every
//! load.

use std::path::Path;

use serde_json::Value;

/// Marker replaced by the caller-supplied bundle root.
pub const BUNDLE_DIR_TOKEN: &str = "[bundle_dir]";

/// Return a copy of `config` with the token in `output.path` replaced by
/// `bundle_root`.
///
/// A top-level array is treated as a list of configurations and each element
/// is rewritten. Configurations without an `output.path` string are returned
/// unchanged.
pub fn substitute_output_path(config: &Value, bundle_root: &str) -> Value {
    let mut resolved = config.clone();
    match &mut resolved {
        Value::Array(configs) => {
            for entry in configs.iter_mut() {
                rewrite_one(entry, bundle_root);
            }
        }
        other => rewrite_one(other, bundle_root),
    }
    resolved
}

fn rewrite_one(config: &mut Value, bundle_root: &str) {
    let Some(path) = output_path_mut(config) else {
        return;
    };

    if let Some(current) = path.as_str() {
        if current.contains(BUNDLE_DIR_TOKEN) {
            *path = Value::String(current.replace(BUNDLE_DIR_TOKEN, bundle_root));
        }
    }
}

/// Make every relative `output.path` absolute against `base`.
///
/// Run after substitution, so a relative bundle root lands under the
/// server's working directory no matter which directory the engine or the
/// asset writer runs in.
pub fn anchor_output_paths(config: &mut Value, base: &Path) {
    match config {
        Value::Array(configs) => {
            for entry in configs.iter_mut() {
                anchor_one(entry, base);
            }
        }
        other => anchor_one(other, base),
    }
}

fn anchor_one(config: &mut Value, base: &Path) {
    let Some(path) = output_path_mut(config) else {
        return;
    };
    let Some(current) = path.as_str().map(Path::new) else {
        return;
    };
    if current.is_absolute() {
        return;
    }
    let anchored = path_clean::clean(base.join(current));
    *path = Value::String(anchored.to_string_lossy().into_owned());
}

fn output_path_mut(config: &mut Value) -> Option<&mut Value> {
    config.get_mut("output")?.get_mut("path")
}
