//! CRDT collaborator seam.
//!
//! The store never interprets update payloads itself. It relies on exactly
//! four operations of the CRDT layer: create a document, apply an update,
//! encode the document state (optionally relative to a remote state vector)
//! and encode its state vector. [`YrsEngine`] provides them over `yrs`.

use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{ReadTxn, StateVector, Transact, Update};

use crate::error::CrdtError;

/// The CRDT operations used by [`Persistence`](crate::Persistence).
pub trait CrdtEngine: Send + Sync + 'static {
    type Doc: Send + 'static;

    fn create(&self) -> Self::Doc;

    fn apply_update(&self, doc: &mut Self::Doc, update: &[u8]) -> Result<(), CrdtError>;

    /// Full state when `since` is `None`, otherwise only what `since` lacks.
    fn encode_state_as_update(
        &self,
        doc: &Self::Doc,
        since: Option<&[u8]>,
    ) -> Result<Vec<u8>, CrdtError>;

    fn encode_state_vector(&self, doc: &Self::Doc) -> Vec<u8>;

    /// Apply `updates` in order. Engines with transactions should override
    /// this to apply the whole batch inside one transaction.
    fn apply_updates(&self, doc: &mut Self::Doc, updates: &[Vec<u8>]) -> Result<(), CrdtError> {
        for update in updates {
            self.apply_update(doc, update)?;
        }
        Ok(())
    }
}

/// [`CrdtEngine`] over Yrs documents (lib0 v1 update encoding).
#[derive(Debug, Clone, Copy, Default)]
pub struct YrsEngine;

impl YrsEngine {
    fn decode_update(bytes: &[u8]) -> Result<Update, CrdtError> {
        Update::decode_v1(bytes).map_err(|e| CrdtError::Decode(e.to_string()))
    }
}

impl CrdtEngine for YrsEngine {
    type Doc = yrs::Doc;

    fn create(&self) -> yrs::Doc {
        yrs::Doc::new()
    }

    fn apply_update(&self, doc: &mut yrs::Doc, update: &[u8]) -> Result<(), CrdtError> {
        let update = Self::decode_update(update)?;
        let mut txn = doc.transact_mut();
        txn.apply_update(update)
            .map_err(|e| CrdtError::Apply(e.to_string()))
    }

    fn apply_updates(&self, doc: &mut yrs::Doc, updates: &[Vec<u8>]) -> Result<(), CrdtError> {
        let mut txn = doc.transact_mut();
        for bytes in updates {
            let update = Self::decode_update(bytes)?;
            txn.apply_update(update)
                .map_err(|e| CrdtError::Apply(e.to_string()))?;
        }
        Ok(())
    }

    fn encode_state_as_update(
        &self,
        doc: &yrs::Doc,
        since: Option<&[u8]>,
    ) -> Result<Vec<u8>, CrdtError> {
        let sv = match since {
            Some(bytes) => {
                StateVector::decode_v1(bytes).map_err(|e| CrdtError::Decode(e.to_string()))?
            }
            None => StateVector::default(),
        };
        let txn = doc.transact();
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    fn encode_state_vector(&self, doc: &yrs::Doc) -> Vec<u8> {
        let txn = doc.transact();
        txn.state_vector().encode_v1()
    }
}

/// Test engine: a document is an append-only list of distinct opaque
/// entries. Updates and state vectors are bincode-encoded, which keeps
/// merge order observable in assertions.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone, Copy, Default)]
    pub(crate) struct OpListEngine;

    impl OpListEngine {
        pub(crate) fn update(entries: &[&[u8]]) -> Vec<u8> {
            let entries: Vec<Vec<u8>> = entries.iter().map(|e| e.to_vec()).collect();
            bincode::serde::encode_to_vec(&entries, bincode::config::standard()).unwrap()
        }

        pub(crate) fn entries(update: &[u8]) -> Vec<Vec<u8>> {
            let (entries, _) =
                bincode::serde::decode_from_slice(update, bincode::config::standard()).unwrap();
            entries
        }
    }

    impl CrdtEngine for OpListEngine {
        type Doc = Vec<Vec<u8>>;

        fn create(&self) -> Self::Doc {
            Vec::new()
        }

        fn apply_update(&self, doc: &mut Self::Doc, update: &[u8]) -> Result<(), CrdtError> {
            let (entries, _): (Vec<Vec<u8>>, _) =
                bincode::serde::decode_from_slice(update, bincode::config::standard())
                    .map_err(|e| CrdtError::Decode(e.to_string()))?;
            for entry in entries {
                if !doc.contains(&entry) {
                    doc.push(entry);
                }
            }
            Ok(())
        }

        fn encode_state_as_update(
            &self,
            doc: &Self::Doc,
            since: Option<&[u8]>,
        ) -> Result<Vec<u8>, CrdtError> {
            let skip = match since {
                Some(sv) => {
                    let (n, _): (u32, _) =
                        bincode::serde::decode_from_slice(sv, bincode::config::standard())
                            .map_err(|e| CrdtError::Decode(e.to_string()))?;
                    n as usize
                }
                None => 0,
            };
            let tail: Vec<Vec<u8>> = doc.iter().skip(skip).cloned().collect();
            bincode::serde::encode_to_vec(&tail, bincode::config::standard())
                .map_err(|e| CrdtError::Apply(e.to_string()))
        }

        fn encode_state_vector(&self, doc: &Self::Doc) -> Vec<u8> {
            bincode::serde::encode_to_vec(doc.len() as u32, bincode::config::standard())
                .unwrap_or_default()
        }
    }
}
