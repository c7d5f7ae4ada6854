//! Cart store.

use std::{fmt, sync::Arc};

use jiff::Timestamp;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, info, instrument, warn};

use crate::{
    auth::{BearerCredential, Identity, IdentityEvent, IdentityProvider},
    domain::carts::{
        lines::{clamp_quantity, dedupe, merge, unique_line_id},
        models::{CartLine, LineId, NewCartLine, OwnerKey},
        records::{RemoteCartItem, RemoteLineKey, RemoteQuantityUpdate},
        remote::RemoteCartService,
        sync::{SyncOp, SyncQueue},
    },
    storage::{SnapshotError, SnapshotStore},
};

/// Local-first shopping cart.
///
/// The in-memory lines are the system of record. Every change is written to
/// the snapshot store under the current owner key, and mirrored to the
/// remote cart service while an identity is authenticated. Remote failures
/// are logged and never undo a local change.
pub struct CartStore {
    lines: Vec<CartLine>,
    identity: Identity,
    ready: bool,
    snapshots: Arc<dyn SnapshotStore>,
    remote: Arc<dyn RemoteCartService>,
    identity_provider: Arc<dyn IdentityProvider>,
    identity_events: broadcast::Receiver<IdentityEvent>,
    sync: SyncQueue,
}

impl fmt::Debug for CartStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartStore")
            .field("owner", &self.owner().to_string())
            .field("ready", &self.ready)
            .field("lines", &self.lines.len())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Build an empty, not yet ready store. Must run inside a Tokio runtime.
    ///
    /// The store subscribes to `identity_provider` immediately, so transitions
    /// that happen before [`CartStore::initialize`] are not lost.
    pub fn new(
        snapshots: Arc<dyn SnapshotStore>,
        remote: Arc<dyn RemoteCartService>,
        identity_provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let identity_events = identity_provider.subscribe();
        let sync = SyncQueue::spawn(Arc::clone(&remote));

        Self {
            lines: Vec::new(),
            identity: Identity::Guest,
            ready: false,
            snapshots,
            remote,
            identity_provider,
            identity_events,
            sync,
        }
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn owner(&self) -> OwnerKey {
        self.identity.owner_key()
    }

    /// Whether the initial load finished; `lines` is meaningless before.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    #[must_use]
    pub fn find_line(&self, line_id: &LineId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.line_id == line_id)
    }

    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    #[must_use]
    pub fn total_value(&self) -> u64 {
        self.lines
            .iter()
            .map(CartLine::line_total)
            .fold(0, u64::saturating_add)
    }

    #[must_use]
    pub fn total_savings(&self) -> u64 {
        self.lines
            .iter()
            .map(CartLine::line_savings)
            .fold(0, u64::saturating_add)
    }

    /// Load the cart for whoever the identity provider currently reports.
    ///
    /// Authenticated identities are loaded from the remote cart, falling back
    /// to the local snapshot when the remote is unavailable, and absorb any
    /// leftover guest cart. Never fails.
    #[instrument(skip(self))]
    pub async fn initialize(&mut self) {
        self.ready = false;

        let identity = Identity::resolve(self.identity_provider.current(), Timestamp::now());
        let owner = identity.owner_key();

        let lines = match identity.credential() {
            None => self.load_snapshot(&owner),
            Some(credential) => {
                let mut working = match self.remote.get_cart(credential).await {
                    Ok(items) => {
                        let now = Timestamp::now();

                        dedupe(items.into_iter().map(|item| item.into_line(now)).collect())
                    }
                    Err(error) => {
                        warn!(%owner, %error, "remote cart unavailable, using local snapshot");

                        self.load_snapshot(&owner)
                    }
                };

                let guest = self.load_snapshot(&OwnerKey::Guest);

                if !guest.is_empty() {
                    info!(%owner, guest_lines = guest.len(), "merging guest cart");

                    working = merge(working, guest);

                    self.replace_remote(credential.clone(), &working).await;
                    self.write_snapshot(&owner, &working);
                    self.discard_guest_snapshot();
                }

                working
            }
        };

        self.identity = identity;
        self.lines = lines;
        self.ready = true;

        debug!(%owner, lines = self.lines.len(), "cart ready");

        self.persist();
    }

    /// React to a login or logout signal.
    ///
    /// Logout starts over with an empty guest cart; nothing is merged back and
    /// any earlier guest snapshot is discarded.
    #[instrument(skip(self))]
    pub async fn handle_identity_event(&mut self, event: IdentityEvent) {
        match event {
            IdentityEvent::Acquired => self.initialize().await,
            IdentityEvent::Cleared => {
                info!(owner = %self.owner(), "resetting cart after logout");

                self.identity = Identity::Guest;
                self.lines.clear();
                self.ready = true;

                self.persist();
            }
        }
    }

    /// Wait for the next identity transition and apply it.
    ///
    /// After missed transitions the store resynchronises with the provider's
    /// current credential and reports the transition it applied. Returns
    /// `None` once the identity provider is gone.
    pub async fn next_identity_event(&mut self) -> Option<IdentityEvent> {
        match self.identity_events.recv().await {
            Ok(event) => {
                self.handle_identity_event(event).await;

                Some(event)
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "missed identity events");

                Some(self.resync().await)
            }
            Err(RecvError::Closed) => None,
        }
    }

    /// Apply every identity transition already signalled, returning how many.
    pub async fn process_identity_events(&mut self) -> usize {
        let mut applied = 0;

        loop {
            match self.identity_events.try_recv() {
                Ok(event) => {
                    self.handle_identity_event(event).await;
                    applied += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed identity events");

                    self.resync().await;
                    applied += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return applied,
            }
        }
    }

    /// Drop buffered transitions and apply the provider's current state.
    async fn resync(&mut self) -> IdentityEvent {
        self.identity_events = self.identity_events.resubscribe();

        let event = if self.identity_provider.current().is_some() {
            IdentityEvent::Acquired
        } else {
            IdentityEvent::Cleared
        };

        self.handle_identity_event(event).await;

        event
    }

    /// Add `requested` units of a product configuration.
    ///
    /// A line with the same variant key absorbs the units and takes the
    /// candidate's snapshot; otherwise a new line is appended. Quantities are
    /// clamped to the candidate's stock snapshot.
    #[instrument(skip(self, candidate), fields(product = %candidate.product_id))]
    pub fn add_line(&mut self, candidate: NewCartLine, requested: u32) -> LineId {
        let key = candidate.variant_key();

        let (line_id, item) =
            if let Some(existing) = self.lines.iter_mut().find(|line| line.variant_key() == key) {
                let total = i64::from(existing.quantity) + i64::from(requested);

                existing.quantity = clamp_quantity(total, candidate.stock_snapshot);
                existing.refresh_snapshot(candidate);

                (existing.line_id.clone(), RemoteCartItem::from(&*existing))
            } else {
                let quantity = clamp_quantity(i64::from(requested), candidate.stock_snapshot);
                let mut line = CartLine::from_candidate(candidate, quantity, Timestamp::now());
                line.line_id = unique_line_id(&self.lines, line.line_id);

                let synced = (line.line_id.clone(), RemoteCartItem::from(&line));

                self.lines.push(line);

                synced
            };

        self.persist();
        self.mirror(|credential| SyncOp::Upsert { credential, item });

        line_id
    }

    /// Remove a line. Unknown ids are ignored.
    #[instrument(skip(self))]
    pub fn remove_line(&mut self, line_id: &LineId) -> Option<CartLine> {
        let index = self.lines.iter().position(|line| &line.line_id == line_id)?;
        let removed = self.lines.remove(index);
        let key = RemoteLineKey::from(removed.variant_key());

        self.persist();
        self.mirror(|credential| SyncOp::Remove { credential, key });

        Some(removed)
    }

    /// Set a line's quantity, clamped to `[1, stock]`. Returns the stored value.
    #[instrument(skip(self))]
    pub fn set_quantity(&mut self, line_id: &LineId, requested: i64) -> Option<u32> {
        let line = self.lines.iter_mut().find(|line| &line.line_id == line_id)?;

        line.quantity = clamp_quantity(requested, line.stock_snapshot);

        let quantity = line.quantity;
        let update = RemoteQuantityUpdate::new(line.variant_key(), quantity);

        self.persist();
        self.mirror(|credential| SyncOp::Update { credential, update });

        Some(quantity)
    }

    /// Remove every line.
    #[instrument(skip(self))]
    pub fn clear(&mut self) {
        self.lines.clear();

        self.persist();
        self.mirror(|credential| SyncOp::Clear { credential });
    }

    /// Wait until every queued remote side effect has been attempted.
    pub async fn flush(&self) {
        self.sync.flush().await;
    }

    fn mirror(&self, op: impl FnOnce(BearerCredential) -> SyncOp) {
        if let Some(credential) = self.identity.credential() {
            self.sync.submit(op(credential.clone()));
        }
    }

    /// Replace the remote cart with `lines`: clear, then add each line.
    async fn replace_remote(&self, credential: BearerCredential, lines: &[CartLine]) {
        self.sync.submit(SyncOp::Clear {
            credential: credential.clone(),
        });

        for line in lines {
            self.sync.submit(SyncOp::Upsert {
                credential: credential.clone(),
                item: RemoteCartItem::from(line),
            });
        }

        self.sync.flush().await;
    }

    fn load_snapshot(&self, owner: &OwnerKey) -> Vec<CartLine> {
        match self.snapshots.load(owner) {
            Ok(lines) => dedupe(lines.unwrap_or_default()),
            Err(SnapshotError::Malformed(error)) => {
                warn!(%owner, %error, "discarding malformed cart snapshot");

                Vec::new()
            }
            Err(error) => {
                warn!(%owner, %error, "failed to read cart snapshot");

                Vec::new()
            }
        }
    }

    fn persist(&self) {
        if !self.ready {
            return;
        }

        self.write_snapshot(&self.owner(), &self.lines);
    }

    fn write_snapshot(&self, owner: &OwnerKey, lines: &[CartLine]) {
        if let Err(error) = self.snapshots.save(owner, lines) {
            warn!(%owner, %error, "failed to write cart snapshot");
        }
    }

    /// Delete the guest snapshot, blanking it when it cannot be deleted so the
    /// guest lines are never merged twice.
    fn discard_guest_snapshot(&self) {
        if let Err(error) = self.snapshots.remove(&OwnerKey::Guest) {
            warn!(%error, "failed to delete guest cart snapshot, blanking it");

            self.write_snapshot(&OwnerKey::Guest, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, PoisonError};

    use testresult::TestResult;

    use crate::{
        auth::SessionIdentity,
        domain::carts::{CartSyncError, MockRemoteCartService},
        storage::{MemorySnapshotStore, MockSnapshotStore},
        test::{
            TestContext,
            helpers::{
                RemoteCall, candidate, credential_for, line, recorded, recording_remote,
                remote_item, variant,
            },
        },
    };

    use super::*;

    fn user() -> OwnerKey {
        OwnerKey::User("u1".to_string())
    }

    /// Identity provider whose event channel can be shut down.
    #[derive(Debug)]
    struct ClosableIdentity {
        events: Mutex<Option<broadcast::Sender<IdentityEvent>>>,
    }

    impl ClosableIdentity {
        fn new() -> Self {
            let (events, _) = broadcast::channel(4);

            Self {
                events: Mutex::new(Some(events)),
            }
        }

        fn close(&self) {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
    }

    impl IdentityProvider for ClosableIdentity {
        fn current(&self) -> Option<BearerCredential> {
            None
        }

        fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
            match self
                .events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
            {
                Some(events) => events.subscribe(),
                None => broadcast::channel(1).1,
            }
        }
    }

    #[tokio::test]
    async fn store_is_not_ready_until_initialized() {
        let mut ctx = TestContext::guest();

        assert!(!ctx.store.is_ready());

        ctx.store.initialize().await;

        assert!(ctx.store.is_ready());
        assert_eq!(ctx.store.owner(), OwnerKey::Guest);
        assert!(ctx.store.lines().is_empty());
    }

    #[tokio::test]
    async fn repeated_adds_of_one_variant_share_a_line() {
        let mut ctx = TestContext::guest();
        ctx.store.initialize().await;

        let first = ctx.store.add_line(variant("p1", "M", "Black", 100, 5), 2);
        let second = ctx.store.add_line(variant("p1", "M", "Black", 100, 5), 2);

        assert_eq!(first, second);
        assert_eq!(ctx.store.lines().len(), 1);
        assert_eq!(ctx.store.total_quantity(), 4);
    }

    #[tokio::test]
    async fn add_clamps_to_stock_snapshot() {
        let mut ctx = TestContext::guest();
        ctx.store.initialize().await;

        let id = ctx.store.add_line(variant("p1", "M", "Black", 100, 5), 10);
        ctx.store.add_line(variant("p1", "M", "Black", 100, 5), 3);

        assert_eq!(ctx.store.find_line(&id).map(|line| line.quantity), Some(5));
    }

    #[tokio::test]
    async fn add_refreshes_snapshot_of_existing_line() {
        let mut ctx = TestContext::guest();
        ctx.store.initialize().await;

        let id = ctx.store.add_line(candidate("p1", 100, 5), 1);

        let mut repriced = candidate("p1", 120, 8);
        repriced.sale_price = Some(90);
        ctx.store.add_line(repriced, 1);

        let line = ctx.store.find_line(&id);
        assert_eq!(line.map(|line| line.unit_price), Some(120));
        assert_eq!(line.map(|line| line.stock_snapshot), Some(8));
        assert_eq!(ctx.store.total_value(), 180);
    }

    #[tokio::test]
    async fn different_variants_get_separate_lines() {
        let mut ctx = TestContext::guest();
        ctx.store.initialize().await;

        ctx.store.add_line(variant("p1", "M", "Black", 100, 5), 1);
        ctx.store.add_line(variant("p1", "L", "Black", 100, 5), 1);
        ctx.store.add_line(variant("p1", "M", "White", 100, 5), 1);

        assert_eq!(ctx.store.lines().len(), 3);
    }

    #[tokio::test]
    async fn set_quantity_clamps_any_request() {
        let mut ctx = TestContext::guest();
        ctx.store.initialize().await;

        let id = ctx.store.add_line(candidate("p1", 100, 5), 2);

        assert_eq!(ctx.store.set_quantity(&id, -4), Some(1));
        assert_eq!(ctx.store.set_quantity(&id, 0), Some(1));
        assert_eq!(ctx.store.set_quantity(&id, 3), Some(3));
        assert_eq!(ctx.store.set_quantity(&id, 500), Some(5));
        assert_eq!(ctx.store.set_quantity(&LineId::from("missing"), 2), None);
    }

    #[tokio::test]
    async fn removing_unknown_line_is_a_no_op() {
        let mut ctx = TestContext::guest();
        ctx.store.initialize().await;
        ctx.store.add_line(candidate("p1", 100, 5), 2);

        assert!(ctx.store.remove_line(&LineId::from("missing")).is_none());
        assert_eq!(ctx.store.lines().len(), 1);
    }

    #[tokio::test]
    async fn totals_use_effective_prices() {
        let mut ctx = TestContext::guest();
        ctx.store.initialize().await;

        let mut sale = candidate("p1", 100, 5);
        sale.sale_price = Some(70);
        let mut not_a_sale = candidate("p2", 50, 5);
        not_a_sale.sale_price = Some(60);

        ctx.store.add_line(sale, 2);
        ctx.store.add_line(not_a_sale, 1);

        assert_eq!(ctx.store.total_quantity(), 3);
        assert_eq!(ctx.store.total_value(), 190);
        assert_eq!(ctx.store.total_savings(), 60);
    }

    #[tokio::test]
    async fn totals_saturate_on_huge_prices() {
        let mut ctx = TestContext::guest();
        ctx.store.initialize().await;

        ctx.store.add_line(candidate("p1", u64::MAX / 2, 5), 3);
        ctx.store.add_line(candidate("p2", u64::MAX / 2, 5), 1);

        assert_eq!(ctx.store.total_value(), u64::MAX);
        assert_eq!(ctx.store.total_savings(), 0);
    }

    #[tokio::test]
    async fn guest_mutations_are_persisted() -> TestResult {
        let mut ctx = TestContext::guest();
        ctx.store.initialize().await;

        let id = ctx.store.add_line(candidate("p1", 100, 5), 2);
        ctx.store.set_quantity(&id, 4);

        let saved = ctx.snapshots.load(&OwnerKey::Guest)?.unwrap_or_default();
        assert_eq!(saved.first().map(|line| line.quantity), Some(4));

        ctx.store.clear();
        assert_eq!(ctx.snapshots.load(&OwnerKey::Guest)?, Some(Vec::new()));

        Ok(())
    }

    #[tokio::test]
    async fn guest_snapshot_is_loaded_and_deduplicated() {
        let snapshots = MemorySnapshotStore::new().with_snapshot(
            OwnerKey::Guest,
            vec![line("p1", 100, 5, 2), line("p1", 100, 5, 2), line("p2", 10, 1, 3)],
        );
        let mut ctx = TestContext::new(MockRemoteCartService::new(), snapshots, None);

        ctx.store.initialize().await;

        let quantities: Vec<u32> = ctx.store.lines().iter().map(|line| line.quantity).collect();
        assert_eq!(quantities, vec![4, 1]);
    }

    #[tokio::test]
    async fn malformed_snapshot_loads_as_empty_cart() {
        let mut snapshots = MockSnapshotStore::new();

        snapshots.expect_load().returning(|_| {
            let source = serde_json::from_str::<Vec<CartLine>>("{").err();

            match source {
                Some(source) => Err(SnapshotError::Malformed(source)),
                None => Ok(None),
            }
        });
        snapshots.expect_save().returning(|_, _| Ok(()));

        let identity = Arc::new(SessionIdentity::default());
        let mut store = CartStore::new(
            Arc::new(snapshots),
            Arc::new(MockRemoteCartService::new()),
            identity,
        );

        store.initialize().await;

        assert!(store.is_ready());
        assert!(store.lines().is_empty());
    }

    #[tokio::test]
    async fn persistence_failures_do_not_block_mutations() {
        let mut snapshots = MockSnapshotStore::new();

        snapshots.expect_load().returning(|_| Ok(None));
        snapshots.expect_save().returning(|_, _| {
            Err(SnapshotError::Io(std::io::Error::other("disk full")))
        });

        let identity = Arc::new(SessionIdentity::default());
        let mut store = CartStore::new(
            Arc::new(snapshots),
            Arc::new(MockRemoteCartService::new()),
            identity,
        );
        store.initialize().await;

        store.add_line(candidate("p1", 100, 5), 2);

        assert_eq!(store.total_quantity(), 2);
    }

    #[tokio::test]
    async fn authenticated_cart_comes_from_remote() {
        let server = vec![remote_item(&line("p1", 100, 5, 1)), remote_item(&line("p1", 100, 5, 1))];
        let (remote, calls) = recording_remote(Some(server));
        let mut ctx = TestContext::signed_in(remote);

        ctx.store.initialize().await;
        ctx.store.flush().await;

        assert_eq!(ctx.store.owner(), user());
        assert_eq!(ctx.store.total_quantity(), 2);
        assert_eq!(ctx.store.lines().len(), 1);
        assert!(ctx.snapshots.contains(&user()));
        assert!(recorded(&calls).is_empty(), "no guest cart, nothing to push");
    }

    #[tokio::test]
    async fn hyphenated_variants_keep_distinct_line_ids() {
        let mut red_blue = remote_item(&line("p1", 100, 5, 1));
        red_blue.size = Some("M".to_string());
        red_blue.color = Some("Red-Blue".to_string());

        let mut m_red = red_blue.clone();
        m_red.size = Some("M-Red".to_string());
        m_red.color = Some("Blue".to_string());

        let (remote, calls) = recording_remote(Some(vec![red_blue, m_red]));
        let mut ctx = TestContext::signed_in(remote);
        ctx.store.initialize().await;

        let ids: Vec<LineId> = ctx.store.lines().iter().map(|line| line.line_id.clone()).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids.first(), ids.get(1));

        let second = ids.get(1).cloned().unwrap_or_else(|| LineId::from("missing"));
        let removed = ctx.store.remove_line(&second);
        ctx.store.flush().await;

        assert_eq!(removed.and_then(|line| line.size), Some("M-Red".to_string()));

        let remaining: Vec<(Option<&str>, Option<&str>)> = ctx
            .store
            .lines()
            .iter()
            .map(|line| (line.size.as_deref(), line.color.as_deref()))
            .collect();
        assert_eq!(remaining, vec![(Some("M"), Some("Red-Blue"))]);

        assert!(matches!(
            recorded(&calls).first(),
            Some(RemoteCall::Remove(key)) if key.size.as_deref() == Some("M-Red")
        ));
    }

    #[tokio::test]
    async fn remote_failure_falls_back_to_user_snapshot() {
        let (remote, _calls) = recording_remote(None);
        let snapshots =
            MemorySnapshotStore::new().with_snapshot(user(), vec![line("p9", 10, 3, 2)]);
        let mut ctx = TestContext::new(remote, snapshots, Some(credential_for("u1")));

        ctx.store.initialize().await;

        assert!(ctx.store.is_ready());
        assert_eq!(ctx.store.owner(), user());
        assert_eq!(
            ctx.store.lines().first().map(|line| line.product_id.as_str()),
            Some("p9")
        );
    }

    #[tokio::test]
    async fn login_merges_guest_cart_once() -> TestResult {
        let (remote, calls) = recording_remote(Some(vec![remote_item(&line("p1", 100, 5, 1))]));
        let mut ctx = TestContext::new(remote, MemorySnapshotStore::new(), None);

        ctx.store.initialize().await;
        ctx.store.add_line(candidate("p1", 100, 5), 2);
        ctx.store.add_line(candidate("p2", 30, 4), 1);

        ctx.identity.login(credential_for("u1"));
        assert_eq!(ctx.store.process_identity_events().await, 1);

        let merged: Vec<(&str, u32)> = ctx
            .store
            .lines()
            .iter()
            .map(|line| (line.product_id.as_str(), line.quantity))
            .collect();
        assert_eq!(merged, vec![("p1", 3), ("p2", 1)]);
        assert_eq!(ctx.store.owner(), user());
        assert!(!ctx.snapshots.contains(&OwnerKey::Guest));
        assert_eq!(ctx.snapshots.load(&user())?.map(|lines| lines.len()), Some(2));

        let pushed = recorded(&calls);
        assert_eq!(pushed.first(), Some(&RemoteCall::Clear));
        assert_eq!(pushed.len(), 3, "clear followed by one add per merged line");
        assert!(matches!(pushed.get(1), Some(RemoteCall::Add(item)) if item.quantity == 3));

        ctx.store.handle_identity_event(IdentityEvent::Acquired).await;
        ctx.store.flush().await;

        assert_eq!(recorded(&calls).len(), 3, "a second login has nothing to merge");

        Ok(())
    }

    #[tokio::test]
    async fn undeletable_guest_snapshot_is_blanked_after_merge() {
        let saved: Arc<Mutex<Vec<(OwnerKey, usize)>>> = Arc::default();
        let log = Arc::clone(&saved);

        let mut snapshots = MockSnapshotStore::new();

        snapshots.expect_load().returning(|owner| {
            if owner.is_guest() {
                Ok(Some(vec![line("p1", 100, 5, 2)]))
            } else {
                Ok(None)
            }
        });
        snapshots.expect_save().returning(move |owner, lines| {
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((owner.clone(), lines.len()));
            Ok(())
        });
        snapshots
            .expect_remove()
            .returning(|_| Err(SnapshotError::Io(std::io::Error::other("read-only"))));

        let (remote, _calls) = recording_remote(Some(Vec::new()));
        let identity = Arc::new(SessionIdentity::new(Some(credential_for("u1"))));
        let mut store = CartStore::new(Arc::new(snapshots), Arc::new(remote), identity);

        store.initialize().await;

        assert_eq!(store.total_quantity(), 2);

        let saved = saved.lock().unwrap_or_else(PoisonError::into_inner).clone();
        assert!(
            saved.contains(&(OwnerKey::Guest, 0)),
            "guest snapshot blanked: {saved:?}"
        );
        assert!(saved.contains(&(user(), 1)), "merged cart saved: {saved:?}");
    }

    #[tokio::test]
    async fn awaited_login_merges_guest_cart() -> TestResult {
        let (remote, _calls) = recording_remote(Some(vec![remote_item(&line("p1", 100, 5, 1))]));
        let mut ctx = TestContext::new(remote, MemorySnapshotStore::new(), None);

        ctx.store.initialize().await;
        ctx.store.add_line(candidate("p1", 100, 5), 2);

        let identity = Arc::clone(&ctx.identity);
        let login = tokio::spawn(async move {
            tokio::task::yield_now().await;
            identity.login(credential_for("u1"));
        });

        let event = ctx.store.next_identity_event().await;
        login.await?;

        assert_eq!(event, Some(IdentityEvent::Acquired));
        assert_eq!(ctx.store.owner(), user());
        assert_eq!(ctx.store.total_quantity(), 3);
        assert!(!ctx.snapshots.contains(&OwnerKey::Guest));

        Ok(())
    }

    #[tokio::test]
    async fn closed_identity_provider_ends_event_stream() {
        let identity = Arc::new(ClosableIdentity::new());
        let mut store = CartStore::new(
            Arc::new(MemorySnapshotStore::new()),
            Arc::new(MockRemoteCartService::new()),
            identity.clone(),
        );
        store.initialize().await;

        identity.close();

        assert_eq!(store.next_identity_event().await, None);
        assert_eq!(store.process_identity_events().await, 0);
    }

    #[tokio::test]
    async fn missed_events_resync_with_current_identity() {
        let (remote, calls) = recording_remote(Some(Vec::new()));
        let mut ctx = TestContext::new(remote, MemorySnapshotStore::new(), None);

        ctx.store.initialize().await;
        ctx.store.add_line(candidate("p1", 100, 5), 2);

        for _ in 0..20 {
            ctx.identity.login(credential_for("u1"));
            ctx.identity.logout();
        }
        ctx.identity.login(credential_for("u1"));

        assert_eq!(ctx.store.process_identity_events().await, 1);
        ctx.store.flush().await;

        assert_eq!(ctx.store.owner(), user());
        assert_eq!(ctx.store.total_quantity(), 2);
        assert_eq!(recorded(&calls).len(), 2, "guest cart merged once");
    }

    #[tokio::test]
    async fn awaited_events_resync_after_lag() {
        let (remote, _calls) = recording_remote(Some(Vec::new()));
        let mut ctx = TestContext::signed_in(remote);
        ctx.store.initialize().await;
        ctx.store.add_line(candidate("p1", 100, 5), 1);

        for _ in 0..20 {
            ctx.identity.logout();
        }

        assert_eq!(
            ctx.store.next_identity_event().await,
            Some(IdentityEvent::Cleared)
        );
        assert_eq!(ctx.store.owner(), OwnerKey::Guest);
        assert!(ctx.store.lines().is_empty());
        assert_eq!(ctx.store.process_identity_events().await, 0);
    }

    #[tokio::test]
    async fn authenticated_mutations_are_mirrored_by_variant_key() {
        let (remote, calls) = recording_remote(Some(Vec::new()));
        let mut ctx = TestContext::signed_in(remote);
        ctx.store.initialize().await;

        let id = ctx.store.add_line(variant("p1", "M", "Black", 100, 5), 2);
        ctx.store.set_quantity(&id, 9);
        ctx.store.remove_line(&id);
        ctx.store.clear();
        ctx.store.flush().await;

        let calls = recorded(&calls);
        assert_eq!(calls.len(), 4);

        assert!(matches!(calls.first(), Some(RemoteCall::Add(item)) if item.quantity == 2));
        assert!(matches!(
            calls.get(1),
            Some(RemoteCall::Update(update))
                if update.quantity == 5 && update.size.as_deref() == Some("M")
        ));
        assert!(matches!(
            calls.get(2),
            Some(RemoteCall::Remove(key))
                if key.product_ref == "p1" && key.color.as_deref() == Some("Black")
        ));
        assert_eq!(calls.get(3), Some(&RemoteCall::Clear));
    }

    #[tokio::test]
    async fn remote_sync_failures_keep_local_changes() {
        let mut remote = MockRemoteCartService::new();

        remote.expect_get_cart().returning(|_| Ok(Vec::new()));
        remote
            .expect_add_to_cart()
            .returning(|_, _| Err(CartSyncError::UnexpectedResponse("503".to_string())));

        let mut ctx = TestContext::signed_in(remote);
        ctx.store.initialize().await;

        ctx.store.add_line(candidate("p1", 100, 5), 2);
        ctx.store.flush().await;

        assert_eq!(ctx.store.total_quantity(), 2);
    }

    #[tokio::test]
    async fn logout_resets_to_empty_guest_cart() -> TestResult {
        let (remote, _calls) = recording_remote(Some(Vec::new()));
        let snapshots = MemorySnapshotStore::new()
            .with_snapshot(OwnerKey::Guest, vec![line("old", 10, 5, 1)]);
        let mut ctx = TestContext::new(remote, snapshots, Some(credential_for("u1")));

        ctx.store.initialize().await;
        ctx.store.add_line(candidate("p1", 100, 5), 1);

        ctx.identity.logout();
        ctx.store.process_identity_events().await;

        assert_eq!(ctx.store.owner(), OwnerKey::Guest);
        assert!(ctx.store.lines().is_empty());
        assert_eq!(ctx.snapshots.load(&OwnerKey::Guest)?, Some(Vec::new()));

        ctx.store.initialize().await;

        assert!(ctx.store.lines().is_empty(), "old guest cart must not come back");
        assert!(ctx.snapshots.contains(&user()), "user snapshot is kept for next login");

        Ok(())
    }
}
