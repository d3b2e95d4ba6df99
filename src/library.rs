//! Named gesture definitions and their on-disk JSON form.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::normalize::NormalizedStroke;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("failed to {action} gesture library {}: {source}", .path.display())]
    Persistence {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed gesture library {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("gesture not found: {0}")]
    NotFound(String),
    #[error("gesture command must not be empty")]
    EmptyCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureDefinition {
    pub command: String,
    pub templates: Vec<NormalizedStroke>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GestureLibrary {
    gestures: Vec<GestureDefinition>,
}

impl GestureLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.gestures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gestures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GestureDefinition> {
        self.gestures.iter()
    }

    pub fn get(&self, command: &str) -> Option<&GestureDefinition> {
        self.gestures.iter().find(|g| g.command == command)
    }

    /// Replaces the definition with the same command in place, or appends.
    pub fn upsert(&mut self, def: GestureDefinition) -> Result<(), LibraryError> {
        if def.command.trim().is_empty() {
            return Err(LibraryError::EmptyCommand);
        }
        match self.gestures.iter().position(|g| g.command == def.command) {
            Some(i) => self.gestures[i] = def,
            None => self.gestures.push(def),
        }
        Ok(())
    }

    pub fn remove(&mut self, command: &str) -> Result<GestureDefinition, LibraryError> {
        let i = self
            .gestures
            .iter()
            .position(|g| g.command == command)
            .ok_or_else(|| LibraryError::NotFound(command.to_string()))?;
        Ok(self.gestures.remove(i))
    }

    fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for g in &self.gestures {
            if g.command.trim().is_empty() {
                return Err("gesture with empty command".into());
            }
            if !seen.insert(g.command.as_str()) {
                return Err(format!("duplicate gesture command '{}'", g.command));
            }
        }
        Ok(())
    }
}

/// Whole-library persistence. Every save writes the full library.
pub trait LibraryStore {
    fn load(&self) -> Result<GestureLibrary, LibraryError>;
    fn save(&mut self, library: &GestureLibrary) -> Result<(), LibraryError>;
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence(&self, action: &'static str, source: io::Error) -> LibraryError {
        LibraryError::Persistence {
            action,
            path: self.path.clone(),
            source,
        }
    }
}

impl LibraryStore for JsonFileStore {
    /// A missing file is an empty library.
    fn load(&self) -> Result<GestureLibrary, LibraryError> {
        let data = match fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no gesture library at {}", self.path.display());
                return Ok(GestureLibrary::new());
            }
            Err(e) => return Err(self.persistence("read", e)),
        };
        let malformed = |reason: String| LibraryError::Malformed {
            path: self.path.clone(),
            reason,
        };
        let library: GestureLibrary =
            serde_json::from_slice(&data).map_err(|e| malformed(e.to_string()))?;
        library.validate().map_err(malformed)?;
        debug!(
            "loaded {} gesture(s) from {}",
            library.len(),
            self.path.display()
        );
        Ok(library)
    }

    /// Writes a sibling temp file and renames it over the library.
    fn save(&mut self, library: &GestureLibrary) -> Result<(), LibraryError> {
        let data = serde_json::to_vec(library)
            .map_err(|e| self.persistence("encode", io::Error::other(e)))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.persistence("create directory for", e))?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, &data).map_err(|e| self.persistence("write", e))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(self.persistence("replace", e));
        }
        info!(
            "saved {} gesture(s) to {}",
            library.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::normalize::tests::circle;
    use crate::stroke::Point;
    use tempfile::TempDir;

    fn def(command: &str, count: usize) -> GestureDefinition {
        GestureDefinition {
            command: command.to_string(),
            templates: (0..count)
                .map(|i| normalize(&circle(40 + i, 50.0, 0.0, 0.0)))
                .collect(),
        }
    }

    #[test]
    fn upsert_replaces_existing_command() {
        let mut lib = GestureLibrary::new();
        lib.upsert(def("a", 1)).unwrap();
        lib.upsert(def("b", 1)).unwrap();
        lib.upsert(def("a", 3)).unwrap();
        assert_eq!(lib.len(), 2);
        assert_eq!(lib.get("a").unwrap().templates.len(), 3);
        let order: Vec<_> = lib.iter().map(|g| g.command.as_str()).collect();
        assert_eq!(order, ["a", "b"]);
    }

    #[test]
    fn upsert_rejects_empty_command() {
        let mut lib = GestureLibrary::new();
        assert!(matches!(lib.upsert(def("  ", 1)), Err(LibraryError::EmptyCommand)));
    }

    #[test]
    fn remove_unknown_command() {
        let mut lib = GestureLibrary::new();
        lib.upsert(def("a", 1)).unwrap();
        assert!(matches!(lib.remove("zzz"), Err(LibraryError::NotFound(c)) if c == "zzz"));
        assert_eq!(lib.remove("a").unwrap().command, "a");
        assert!(lib.is_empty());
    }

    #[test]
    fn missing_file_is_empty_library() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("gestures.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn garbage_file_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gestures.json");
        fs::write(&path, "{ not json").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, LibraryError::Malformed { .. }), "{err}");
    }

    #[test]
    fn short_template_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gestures.json");
        fs::write(
            &path,
            r#"[{"command":"x","templates":[[{"x":0,"y":0},{"x":1,"y":1}]]}]"#,
        )
        .unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("expected 64"), "{err}");
    }

    #[test]
    fn duplicate_commands_are_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gestures.json");
        let lib = vec![def("dup", 1), def("dup", 1)];
        fs::write(&path, serde_json::to_vec(&lib).unwrap()).unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("duplicate"), "{err}");
    }

    #[test]
    fn save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("gestures.json");
        let mut store = JsonFileStore::new(&path);
        let mut lib = GestureLibrary::new();
        lib.upsert(def("firefox", 2)).unwrap();
        lib.upsert(def("kitty", 1)).unwrap();
        store.save(&lib).unwrap();

        assert_eq!(store.load().unwrap(), lib);
        assert!(!dir.path().join("nested").join("gestures.json.tmp").exists());
    }

    #[test]
    fn reads_upper_case_point_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gestures.json");
        let points: Vec<_> = (0..64)
            .map(|i| serde_json::json!({"X": i as f64, "Y": 0.0}))
            .collect();
        let doc = serde_json::json!([{"command": "legacy", "templates": [points]}]);
        fs::write(&path, doc.to_string()).unwrap();

        let lib = JsonFileStore::new(&path).load().unwrap();
        let t = &lib.get("legacy").unwrap().templates[0];
        assert_eq!(t.points()[5], Point::new(5.0, 0.0));
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let mut store = JsonFileStore::new(blocker.join("gestures.json"));
        let err = store.save(&GestureLibrary::new()).unwrap_err();
        assert!(matches!(err, LibraryError::Persistence { .. }), "{err}");
    }
}
