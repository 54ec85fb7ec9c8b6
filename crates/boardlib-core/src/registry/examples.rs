//! Example sketches shipped inside installed libraries.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const EXAMPLES_DIR: &str = "examples";
const SKETCH_EXTENSIONS: [&str; 2] = ["ino", "pde"];

/// Sketch directories under `<library>/examples`, at any depth.
///
/// A directory is a sketch when it holds a main file named after it with a
/// sketch extension. The comparison is case-exact, so `Basic/basic.ino` is
/// not a sketch even on case-insensitive filesystems.
pub fn find_examples(library_dir: &Path) -> Vec<PathBuf> {
    let root = library_dir.join(EXAMPLES_DIR);
    if !root.is_dir() {
        return Vec::new();
    }

    let mut sketches: Vec<PathBuf> = WalkDir::new(&root)
        .min_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_main_sketch_file(e.path()))
        .filter_map(|e| e.path().parent().map(Path::to_path_buf))
        .collect();
    sketches.sort();
    sketches.dedup();
    sketches
}

fn is_main_sketch_file(path: &Path) -> bool {
    let (Some(stem), Some(ext), Some(dir)) = (
        path.file_stem(),
        path.extension(),
        path.parent().and_then(Path::file_name),
    ) else {
        return false;
    };
    stem == dir && SKETCH_EXTENSIONS.iter().any(|s| ext == *s)
}
