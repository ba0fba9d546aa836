//! Playlists of sequence names

use alloc::string::String;
use alloc::vec::Vec;

/// Ordered list of sequence references
///
/// Holds names, not copies; sequences are loaded when the playlist runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Playlist {
    entries: Vec<String>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sequence name
    pub fn add(&mut self, name: &str) {
        self.entries.push(String::from(name));
    }

    /// Remove the entry at `index`
    pub fn remove(&mut self, index: usize) -> Option<String> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Move an entry to a new position
    ///
    /// Returns false if either index is out of range.
    pub fn move_entry(&mut self, from: usize, to: usize) -> bool {
        if from >= self.entries.len() || to >= self.entries.len() {
            return false;
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Playlist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|s| String::from(s.as_ref())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(p: &Playlist) -> Vec<&str> {
        p.entries().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_add_remove() {
        let mut p = Playlist::new();
        p.add("pick");
        p.add("place");
        p.add("pick");
        assert_eq!(names(&p), ["pick", "place", "pick"]);
        assert_eq!(p.remove(1).as_deref(), Some("place"));
        assert_eq!(p.remove(7), None);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_reorder() {
        let mut p: Playlist = ["a", "b", "c"].into_iter().collect();
        assert!(p.move_entry(0, 2));
        assert_eq!(names(&p), ["b", "c", "a"]);
        assert!(p.move_entry(2, 0));
        assert_eq!(names(&p), ["a", "b", "c"]);
        assert!(!p.move_entry(0, 3));
    }

    #[test]
    fn test_clear() {
        let mut p: Playlist = ["a"].into_iter().collect();
        p.clear();
        assert!(p.is_empty());
    }
}
