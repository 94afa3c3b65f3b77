use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Fresh scratch directory, removed when the guard drops (also on panic).
pub fn scratch_dir(label: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(&format!("dropview_{}_", label))
        .tempdir()
        .unwrap()
}

pub fn write_file(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn write_png(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 120, 40, 255]))
        .save(&path)
        .unwrap();
    path
}

#[cfg(test)]
mod tests {
    use super::{scratch_dir, write_file};

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let scratch = scratch_dir("cleanup");
        let path = scratch.path().to_path_buf();
        write_file(&path, "nested/file.bin", b"x");
        drop(scratch);
        assert!(!path.exists());
    }
}
