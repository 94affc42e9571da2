/*!
 * Atom Cache
 *
 * Bidirectional name/atom memo in front of the transport. A name or atom
 * seen once is never looked up on the server again. Lookups take a read
 * lock; round trips happen with no lock held, and only successful results
 * are remembered.
 */

use crate::core::errors::ClipboardResult;
use crate::core::types::Atom;
use crate::transport::Transport;
use ahash::HashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;

#[derive(Default)]
struct AtomMaps {
    by_name: HashMap<String, Atom>,
    by_atom: HashMap<Atom, String>,
}

/// Interning cache shared by every thread of an engine
pub struct AtomCache {
    transport: Arc<dyn Transport>,
    maps: RwLock<AtomMaps>,
}

impl AtomCache {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            maps: RwLock::new(AtomMaps::default()),
        }
    }

    /// Atom for `name`, interning it on first use
    pub fn intern(&self, name: &str) -> ClipboardResult<Atom> {
        if let Some(atom) = self.lookup(name) {
            return Ok(atom);
        }

        let atom = self.transport.intern_atom(name)?;
        self.remember(name, atom);
        trace!(atom, name, "atom cached");
        Ok(atom)
    }

    /// Name of `atom`, asking the server on first use
    pub fn resolve(&self, atom: Atom) -> ClipboardResult<String> {
        if let Some(name) = self.cached_name(atom) {
            return Ok(name);
        }

        let name = self.transport.atom_name(atom)?;
        self.remember(&name, atom);
        trace!(atom, name = %name, "atom name cached");
        Ok(name)
    }

    /// Cached atom for `name`; never round trips
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Atom> {
        self.maps.read().by_name.get(name).copied()
    }

    /// Cached name for `atom`; never round trips
    #[must_use]
    pub fn cached_name(&self, atom: Atom) -> Option<String> {
        self.maps.read().by_atom.get(&atom).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.read().by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remember(&self, name: &str, atom: Atom) {
        let mut maps = self.maps.write();
        maps.by_name.insert(name.to_string(), atom);
        maps.by_atom.insert(atom, name.to_string());
    }
}
