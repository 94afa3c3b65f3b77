use super::controller::InputEvent;
use crate::assets::{FileBlob, Fileset};
use std::io;
use std::path::{Path, PathBuf};

/// Collects winit's one-file-per-event drops into a single batch.
///
/// The first file of a batch yields [`InputEvent::DropStart`]; the batch is
/// closed by [`DropZone::flush`] once the event loop goes idle.
#[derive(Debug, Default)]
pub struct DropZone {
    pending: Vec<PathBuf>,
}

impl DropZone {
    pub fn on_dropped_file(&mut self, path: PathBuf) -> Option<InputEvent> {
        let starting = self.pending.is_empty();
        self.pending.push(path);
        starting.then_some(InputEvent::DropStart)
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn flush(&mut self) -> Option<InputEvent> {
        if self.pending.is_empty() {
            return None;
        }
        let items = std::mem::take(&mut self.pending);
        Some(match collect_fileset(&items) {
            Ok(fileset) => InputEvent::Drop(fileset),
            Err(err) => InputEvent::DropError(err.to_string()),
        })
    }
}

/// Expand dropped files and folders into a [`Fileset`].
///
/// Keys are relative to the parent of each dropped item and use `/`
/// separators, so dropping a folder `duck/` yields `duck/Duck.gltf`.
/// Directory entries are visited in name order.
pub fn collect_fileset(items: &[PathBuf]) -> io::Result<Fileset> {
    let mut fileset = Fileset::new();
    for item in items {
        let prefix = item
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("cannot drop {}", item.display()),
                )
            })?;
        walk(item, &prefix, &mut fileset)?;
    }
    Ok(fileset)
}

fn walk(path: &Path, key: &str, fileset: &mut Fileset) -> io::Result<()> {
    if path.is_dir() {
        let mut entries = std::fs::read_dir(path)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort();
        for entry in entries {
            let name = entry
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            walk(&entry, &format!("{}/{}", key, name), fileset)?;
        }
    } else if path.is_file() {
        fileset.insert(key, FileBlob::Path(path.to_path_buf()));
    } else {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a readable file", path.display()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{collect_fileset, DropZone};
    use crate::app::controller::InputEvent;
    use crate::test_support::{scratch_dir, write_file};

    #[test]
    fn folder_drop_keeps_relative_paths() {
        let scratch = scratch_dir("drop_folder");
        let root = scratch.path();
        write_file(root, "duck/Duck.gltf", b"{}");
        write_file(root, "duck/textures/DuckCM.png", b"png");
        write_file(root, "duck/Duck0.bin", b"bin");

        let fileset = collect_fileset(&[root.join("duck")]).unwrap();
        let paths: Vec<&str> = fileset.paths().collect();
        assert_eq!(
            paths,
            vec!["duck/Duck.gltf", "duck/Duck0.bin", "duck/textures/DuckCM.png"]
        );
    }

    #[test]
    fn batch_emits_start_once_then_drop() {
        let scratch = scratch_dir("drop_batch");
        let root = scratch.path();
        let gltf = write_file(root, "Box.gltf", b"{}");
        let bin = write_file(root, "Box0.bin", b"bin");

        let mut zone = DropZone::default();
        assert_eq!(zone.on_dropped_file(gltf), Some(InputEvent::DropStart));
        assert_eq!(zone.on_dropped_file(bin), None);
        assert!(zone.is_pending());

        match zone.flush() {
            Some(InputEvent::Drop(fileset)) => {
                assert_eq!(fileset.paths().collect::<Vec<_>>(), vec!["Box.gltf", "Box0.bin"]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!zone.is_pending());
        assert_eq!(zone.flush(), None);
    }

    #[test]
    fn vanished_file_becomes_drop_error() {
        let scratch = scratch_dir("drop_missing");
        let root = scratch.path();
        let mut zone = DropZone::default();
        zone.on_dropped_file(root.join("gone.glb"));
        assert!(matches!(zone.flush(), Some(InputEvent::DropError(_))));
    }
}
