//! Desired registration set, its digest summary, and status reconciliation.
//!
//! The registration manager owns the client's *desired* set of
//! registrations. The set is pure: duplicates and ordering do not exist, and
//! its digest is a function of membership only. The server compares the
//! summary `(count, digest)` in each client header against its own cache to
//! detect divergence without shipping the whole set.
//!
//! The manager is owned by the driving client and is not internally
//! synchronized; the caller serializes access.

use std::collections::HashMap;

use bytes::Bytes;
use ticl_proto::{
    ObjectId, RegistrationOpType, RegistrationStatus, RegistrationSubtree, RegistrationSummary,
};

use crate::digest::DigestFunction;
use crate::statistics::{ClientErrorType, Statistics};

/// Set of object ids with an incrementally maintained, order-independent
/// digest.
///
/// Each element is digested individually (over its canonical byte
/// serialization) and the set digest is the XOR fold of the element digests.
/// XOR is commutative and self-inverse, so membership changes update the
/// fold in O(1) and the result depends only on the set. The empty set
/// digests the empty byte string, so an idle client and an idle server agree
/// without special-casing.
pub struct DesiredRegistrationStore<D> {
    digest_function: D,
    /// Element digests, keyed by the element itself
    elements: HashMap<ObjectId, Bytes>,
    /// XOR fold of the element digests; empty while the set is empty
    digest_fold: Vec<u8>,
}

impl<D: DigestFunction> DesiredRegistrationStore<D> {
    /// Create an empty store around a digest function.
    pub fn new(digest_function: D) -> Self {
        Self { digest_function, elements: HashMap::new(), digest_fold: Vec::new() }
    }

    /// Union the given object ids into the set. Idempotent.
    pub fn add(&mut self, object_ids: &[ObjectId]) {
        for object_id in object_ids {
            if self.elements.contains_key(object_id) {
                continue;
            }
            let element_digest = self.digest_function.digest(&object_id.digest_bytes());
            self.fold_in(&element_digest);
            self.elements.insert(object_id.clone(), element_digest);
        }
    }

    /// Remove the given object ids from the set. Idempotent.
    pub fn remove(&mut self, object_ids: &[ObjectId]) {
        for object_id in object_ids {
            if let Some(element_digest) = self.elements.remove(object_id) {
                self.fold_in(&element_digest);
            }
        }
        if self.elements.is_empty() {
            self.digest_fold.clear();
        }
    }

    /// Whether the set contains the object id.
    #[must_use]
    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.elements.contains_key(object_id)
    }

    /// Cardinality of the set.
    #[must_use]
    pub fn size(&self) -> usize {
        self.elements.len()
    }

    /// All elements whose digest starts with the given bit prefix.
    ///
    /// `prefix_len_bits == 0` returns the whole set. Order is unspecified.
    #[must_use]
    pub fn get_elements(&self, prefix: &[u8], prefix_len_bits: usize) -> Vec<ObjectId> {
        self.elements
            .iter()
            .filter(|(_, digest)| prefix_matches(digest, prefix, prefix_len_bits))
            .map(|(object_id, _)| object_id.clone())
            .collect()
    }

    /// Order-independent digest of the current set.
    #[must_use]
    pub fn get_digest(&self) -> Bytes {
        if self.elements.is_empty() {
            self.digest_function.digest(&[])
        } else {
            Bytes::copy_from_slice(&self.digest_fold)
        }
    }

    fn fold_in(&mut self, element_digest: &[u8]) {
        if self.digest_fold.is_empty() {
            self.digest_fold = vec![0; element_digest.len()];
        }
        for (acc, byte) in self.digest_fold.iter_mut().zip(element_digest) {
            *acc ^= byte;
        }
    }
}

/// Whether the first `prefix_len_bits` bits of `digest` equal those of
/// `prefix`.
fn prefix_matches(digest: &[u8], prefix: &[u8], prefix_len_bits: usize) -> bool {
    if prefix_len_bits == 0 {
        return true;
    }
    if prefix_len_bits > digest.len() * 8 || prefix_len_bits > prefix.len() * 8 {
        return false;
    }
    let full_bytes = prefix_len_bits / 8;
    if digest[..full_bytes] != prefix[..full_bytes] {
        return false;
    }
    let rem_bits = prefix_len_bits % 8;
    if rem_bits == 0 {
        return true;
    }
    let mask = 0xFFu8 << (8 - rem_bits);
    (digest[full_bytes] & mask) == (prefix[full_bytes] & mask)
}

/// Tracks the client's desired registrations and reconciles server-reported
/// outcomes against them.
pub struct RegistrationManager<D> {
    desired_registrations: DesiredRegistrationStore<D>,
    /// Most recent summary the server has reported for this client.
    ///
    /// Initialized to the empty-set client summary rather than a default
    /// sentinel: an idle client must match an idle server without
    /// provoking a spurious divergence exchange.
    last_known_server_summary: RegistrationSummary,
}

impl<D: DigestFunction> RegistrationManager<D> {
    /// Create a manager with an empty desired set.
    pub fn new(digest_function: D) -> Self {
        let desired_registrations = DesiredRegistrationStore::new(digest_function);
        let last_known_server_summary = summary_of(&desired_registrations);
        Self { desired_registrations, last_known_server_summary }
    }

    /// Apply register/unregister to the desired set.
    pub fn perform_operations(&mut self, object_ids: &[ObjectId], op_type: RegistrationOpType) {
        match op_type {
            RegistrationOpType::Register => self.desired_registrations.add(object_ids),
            RegistrationOpType::Unregister => self.desired_registrations.remove(object_ids),
        }
    }

    /// Build the registration subtree for a sync response.
    #[must_use]
    pub fn get_registrations(&self, prefix: &[u8], prefix_len_bits: usize) -> RegistrationSubtree {
        RegistrationSubtree {
            registered_objects: self.desired_registrations.get_elements(prefix, prefix_len_bits),
        }
    }

    /// The client's current registration summary.
    #[must_use]
    pub fn client_summary(&self) -> RegistrationSummary {
        summary_of(&self.desired_registrations)
    }

    /// Record the summary the server reported in a frame header.
    pub fn record_server_summary(&mut self, summary: &RegistrationSummary) {
        self.last_known_server_summary = summary.clone();
    }

    /// Whether the server's cached summary matches the client's current one.
    #[must_use]
    pub fn is_state_in_sync_with_server(&self) -> bool {
        self.last_known_server_summary == self.client_summary()
    }

    /// Whether the object id is currently desired.
    #[must_use]
    pub fn is_desired(&self, object_id: &ObjectId) -> bool {
        self.desired_registrations.contains(object_id)
    }

    /// Reconcile server-reported outcomes with the desired set.
    ///
    /// Returns one flag per input status, positionally aligned: `true` when
    /// the outcome is compatible with local desire, `false` when the entry
    /// was removed locally and the caller must surface a registration
    /// failure to the application.
    ///
    /// A SUCCESS reply is incompatible when its direction contradicts the
    /// desired set (a successful register for an object we do not desire, or
    /// a successful unregister for one we do); the registration is dropped
    /// locally so the application can re-issue its actual intent. A
    /// non-SUCCESS reply always drops the registration.
    pub fn handle_registration_status(
        &mut self,
        registration_statuses: &[RegistrationStatus],
        stats: &mut Statistics,
    ) -> Vec<bool> {
        let mut success_status = Vec::with_capacity(registration_statuses.len());
        for registration_status in registration_statuses {
            let object_id = &registration_status.registration.object_id;
            let mut is_success = true;

            if registration_status.status.is_success() {
                let in_requested_set = self.desired_registrations.contains(object_id);
                let is_register =
                    registration_status.registration.op_type == RegistrationOpType::Register;
                if is_register ^ in_requested_set {
                    self.desired_registrations.remove(std::slice::from_ref(object_id));
                    stats.record_error(ClientErrorType::RegistrationDiscrepancy);
                    tracing::info!(
                        registered = is_register,
                        requested = in_requested_set,
                        object_id = ?object_id,
                        "registration discrepancy detected, removing from requested"
                    );
                    is_success = false;
                }
            } else {
                self.desired_registrations.remove(std::slice::from_ref(object_id));
                tracing::debug!(object_id = ?object_id, "removing failed registration");
                is_success = false;
            }
            success_status.push(is_success);
        }
        success_status
    }
}

fn summary_of<D: DigestFunction>(store: &DesiredRegistrationStore<D>) -> RegistrationSummary {
    RegistrationSummary {
        num_registrations: store.size() as u32,
        registration_digest: store.get_digest(),
    }
}
