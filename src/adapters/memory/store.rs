//! In-memory reservation store.
//!
//! Implements every store port over one mutex. Holding the mutex for the
//! whole of an operation gives the same all-or-nothing behaviour as a
//! serializable transaction, so the locking protocol can be exercised without
//! a database.
//!
//! Intended for tests and local runs. State is lost on restart.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::checkout::{CheckoutSession, LockedTicket};
use crate::domain::foundation::{
    CinemaId, DomainError, ErrorCode, HallId, Money, MovieId, PaymentSessionId, ScheduleId,
    SeatId, TicketId, Timestamp, UserId,
};
use crate::domain::ticket::{Ticket, TicketLock, TicketState};
use crate::ports::{
    AuthTokenStore, CatalogReader, CheckoutSessionRepository, CreateTickets, ExpiredLockSweep,
    FulfillOutcome, HallInfo, LockTicket, ScheduleInfo, SeatInfo, TicketReader, TicketRepository,
    TicketSeat, UnlockTicket,
};

#[derive(Debug, Clone)]
struct Cinema {
    name: String,
    owner_id: UserId,
}

#[derive(Debug, Clone)]
struct Hall {
    cinema_id: CinemaId,
    name: String,
    seat_price: Money,
}

#[derive(Debug, Default)]
struct State {
    cinemas: HashMap<CinemaId, Cinema>,
    halls: HashMap<HallId, Hall>,
    seats: HashMap<SeatId, SeatInfo>,
    movies: HashMap<MovieId, String>,
    schedules: HashMap<ScheduleId, ScheduleInfo>,
    tickets: BTreeMap<TicketId, Ticket>,
    locks: HashMap<TicketId, TicketLock>,
    sessions: HashMap<UserId, CheckoutSession>,
    tokens: Vec<Timestamp>,
}

impl State {
    fn has_session(&self, user_id: &UserId) -> bool {
        self.sessions.contains_key(user_id)
    }

    fn locked_by(&self, user_id: &UserId) -> Vec<TicketId> {
        self.locks
            .values()
            .filter(|lock| lock.is_held_by(user_id))
            .map(|lock| lock.ticket_id)
            .collect()
    }

    fn ticket(&self, id: TicketId) -> Result<&Ticket, DomainError> {
        self.tickets.get(&id).ok_or_else(|| ticket_not_found(id))
    }

    fn schedule(&self, id: ScheduleId) -> Result<&ScheduleInfo, DomainError> {
        self.schedules.get(&id).ok_or_else(|| {
            DomainError::new(ErrorCode::ScheduleNotFound, "Schedule not found")
                .with_detail("schedule_id", id.to_string())
        })
    }

    fn locked_view(&self, ticket: &Ticket, lock: &TicketLock) -> Option<LockedTicket> {
        let seat = self.seats.get(&ticket.seat_id())?;
        let schedule = self.schedules.get(&ticket.schedule_id())?;
        let hall = self.halls.get(&schedule.hall_id)?;
        let cinema = self.cinemas.get(&hall.cinema_id)?;
        let movie = self.movies.get(&schedule.movie_id)?;
        Some(LockedTicket {
            ticket: ticket.clone(),
            lock_expires_at: lock.expires_at,
            movie_title: movie.clone(),
            cinema_name: cinema.name.clone(),
            hall_name: hall.name.clone(),
            seat_row: seat.row,
            seat_number: seat.number,
            starts_at: schedule.starts_at,
        })
    }
}

fn ticket_not_found(id: TicketId) -> DomainError {
    DomainError::new(ErrorCode::TicketNotFound, "Ticket not found")
        .with_detail("ticket_id", id.to_string())
}

fn locks_changed(user_id: &UserId) -> DomainError {
    DomainError::conflict("Locked tickets changed while the checkout was opening")
        .with_detail("user_id", user_id.to_string())
}

fn checkout_in_progress(user_id: &UserId) -> DomainError {
    DomainError::new(
        ErrorCode::CheckoutInProgress,
        "A checkout is in progress; finish or let it expire first",
    )
    .with_detail("user_id", user_id.to_string())
}

/// Single-process implementation of the store and catalog ports.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    fail_next_session_create: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::new(ErrorCode::InternalError, "in-memory store poisoned"))
    }

    /// Seeding and inspection keep working after a panic elsewhere.
    fn state_recovered(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // === Catalog seeding ===

    pub fn add_cinema(&self, owner_id: UserId, name: impl Into<String>) -> CinemaId {
        let id = CinemaId::new();
        self.state_recovered().cinemas.insert(
            id,
            Cinema {
                name: name.into(),
                owner_id,
            },
        );
        id
    }

    pub fn add_hall(&self, cinema_id: CinemaId, name: impl Into<String>, seat_price: Money) -> HallId {
        let id = HallId::new();
        self.state_recovered().halls.insert(
            id,
            Hall {
                cinema_id,
                name: name.into(),
                seat_price,
            },
        );
        id
    }

    /// Adds `rows * per_row` seats numbered from 1.
    pub fn add_seats(&self, hall_id: HallId, rows: i32, per_row: i32) -> Vec<SeatId> {
        let mut ids = Vec::new();
        let mut state = self.state_recovered();
        for row in 1..=rows {
            for number in 1..=per_row {
                let id = SeatId::new();
                state.seats.insert(
                    id,
                    SeatInfo {
                        id,
                        hall_id,
                        row,
                        number,
                    },
                );
                ids.push(id);
            }
        }
        ids
    }

    pub fn add_movie(&self, title: impl Into<String>) -> MovieId {
        let id = MovieId::new();
        self.state_recovered().movies.insert(id, title.into());
        id
    }

    pub fn add_schedule(
        &self,
        hall_id: HallId,
        movie_id: MovieId,
        starts_at: Timestamp,
        price: Money,
    ) -> ScheduleId {
        let id = ScheduleId::new();
        self.state_recovered().schedules.insert(
            id,
            ScheduleInfo {
                id,
                hall_id,
                movie_id,
                starts_at,
                price,
            },
        );
        id
    }

    pub fn add_auth_token(&self, expires_at: Timestamp) {
        self.state_recovered().tokens.push(expires_at);
    }

    // === Test helpers ===

    /// Makes the next `CheckoutSessionRepository::create` fail with a database error.
    pub fn fail_next_session_create(&self) {
        self.fail_next_session_create.store(true, Ordering::SeqCst);
    }

    pub fn lock_for(&self, ticket_id: TicketId) -> Option<TicketLock> {
        self.state_recovered().locks.get(&ticket_id).cloned()
    }

    pub fn lock_count(&self) -> usize {
        self.state_recovered().locks.len()
    }

    pub fn session_count(&self) -> usize {
        self.state_recovered().sessions.len()
    }

    pub fn auth_token_count(&self) -> usize {
        self.state_recovered().tokens.len()
    }

    pub fn tickets_for(&self, schedule_id: ScheduleId) -> Vec<Ticket> {
        self.state_recovered()
            .tickets
            .values()
            .filter(|t| t.schedule_id() == schedule_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TicketRepository for InMemoryStore {
    async fn find_by_id(&self, id: TicketId) -> Result<Option<Ticket>, DomainError> {
        Ok(self.state()?.tickets.get(&id).cloned())
    }

    async fn create_all_for_schedule(&self, request: CreateTickets) -> Result<u64, DomainError> {
        let mut state = self.state()?;
        state.schedule(request.schedule_id)?;

        let mut created = 0;
        for seat_id in request.seat_ids {
            let exists = state
                .tickets
                .values()
                .any(|t| t.schedule_id() == request.schedule_id && t.seat_id() == seat_id);
            if exists {
                continue;
            }
            let ticket = Ticket::new(request.schedule_id, seat_id, request.price, request.now);
            state.tickets.insert(ticket.id(), ticket);
            created += 1;
        }
        Ok(created)
    }

    async fn lock(&self, request: LockTicket) -> Result<Ticket, DomainError> {
        let mut state = self.state()?;

        let current = state.ticket(request.ticket_id)?.clone();
        let locked = current.transitioned(TicketState::Locked, request.now)?;
        if let Some(expected) = request.expected_version {
            current.check_version(expected)?;
        }
        let schedule = state.schedule(current.schedule_id())?;
        if schedule.has_started(request.now) {
            return Err(DomainError::new(
                ErrorCode::ScheduleStarted,
                format!("Schedule {} has already started", schedule.id),
            ));
        }
        if state.has_session(&request.user_id) {
            return Err(checkout_in_progress(&request.user_id));
        }

        state.tickets.insert(locked.id(), locked.clone());
        state.locks.insert(
            locked.id(),
            TicketLock::new(locked.id(), request.user_id, request.expires_at),
        );
        Ok(locked)
    }

    async fn unlock(&self, request: UnlockTicket) -> Result<Ticket, DomainError> {
        let mut state = self.state()?;

        let current = state.ticket(request.ticket_id)?.clone();
        let lock = state.locks.get(&request.ticket_id).cloned().ok_or_else(|| {
            DomainError::new(ErrorCode::TicketUnavailable, "Ticket is not locked")
                .with_detail("ticket_id", request.ticket_id.to_string())
        })?;
        if !lock.is_held_by(&request.user_id) {
            return Err(DomainError::new(
                ErrorCode::Forbidden,
                "Ticket is locked by another user",
            ));
        }
        if state.has_session(&request.user_id) {
            return Err(checkout_in_progress(&request.user_id));
        }
        if let Some(expected) = request.expected_version {
            current.check_version(expected)?;
        }
        let unlocked = current.transitioned(TicketState::Unsold, request.now)?;

        state.locks.remove(&request.ticket_id);
        state.tickets.insert(unlocked.id(), unlocked.clone());
        Ok(unlocked)
    }

    async fn unlock_all_expired(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> Result<ExpiredLockSweep, DomainError> {
        let mut state = self.state()?;

        let mut candidates: Vec<TicketLock> = state
            .locks
            .values()
            .filter(|lock| lock.is_expired_at(now) && !state.has_session(&lock.user_id))
            .cloned()
            .collect();
        candidates.sort_by_key(|lock| lock.expires_at);
        candidates.truncate(limit as usize);

        let mut sweep = ExpiredLockSweep::default();
        for lock in candidates {
            let reverted = state
                .ticket(lock.ticket_id)
                .and_then(|t| t.transitioned(TicketState::Unsold, now));
            match reverted {
                Ok(ticket) => {
                    state.locks.remove(&lock.ticket_id);
                    state.tickets.insert(ticket.id(), ticket);
                    sweep.released.push(lock.ticket_id);
                }
                Err(err) => sweep.failed.push((lock.ticket_id, err.to_string())),
            }
        }
        Ok(sweep)
    }
}

#[async_trait]
impl TicketReader for InMemoryStore {
    async fn list_for_schedule(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<Vec<TicketSeat>, DomainError> {
        let state = self.state()?;
        let mut rows: Vec<TicketSeat> = state
            .tickets
            .values()
            .filter(|t| t.schedule_id() == schedule_id)
            .filter_map(|t| {
                state.seats.get(&t.seat_id()).map(|seat| TicketSeat {
                    ticket: t.clone(),
                    seat_id: seat.id,
                    row: seat.row,
                    number: seat.number,
                })
            })
            .collect();
        rows.sort_by_key(|r| (r.row, r.number));
        Ok(rows)
    }

    async fn find_locked_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<LockedTicket>, DomainError> {
        let state = self.state()?;
        Ok(state
            .locks
            .values()
            .filter(|lock| lock.is_held_by(user_id))
            .filter_map(|lock| {
                let ticket = state.tickets.get(&lock.ticket_id)?;
                state.locked_view(ticket, lock)
            })
            .collect())
    }
}

#[async_trait]
impl CheckoutSessionRepository for InMemoryStore {
    async fn create(&self, session: &CheckoutSession) -> Result<(), DomainError> {
        if self.fail_next_session_create.swap(false, Ordering::SeqCst) {
            return Err(DomainError::database("injected failure"));
        }
        let mut state = self.state()?;
        if state.has_session(&session.user_id) {
            return Err(checkout_in_progress(&session.user_id));
        }
        if !session.covers_exactly(&state.locked_by(&session.user_id)) {
            return Err(locks_changed(&session.user_id));
        }
        state.sessions.insert(session.user_id.clone(), session.clone());
        Ok(())
    }

    async fn find_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<CheckoutSession>, DomainError> {
        Ok(self.state()?.sessions.get(user_id).cloned())
    }

    async fn find_by_session_id(
        &self,
        session_id: &PaymentSessionId,
    ) -> Result<Option<CheckoutSession>, DomainError> {
        Ok(self
            .state()?
            .sessions
            .values()
            .find(|s| &s.session_id == session_id)
            .cloned())
    }

    async fn fulfill(
        &self,
        session_id: &PaymentSessionId,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<FulfillOutcome, DomainError> {
        let mut state = self.state()?;

        let priced = match state.sessions.get(user_id) {
            Some(s) if &s.session_id == session_id => s.ticket_ids.clone(),
            _ => return Ok(FulfillOutcome::NoSession),
        };

        // Validate every transition before applying any of them.
        let mut sold = Vec::with_capacity(priced.len());
        for id in &priced {
            let held = state
                .locks
                .get(id)
                .map(|lock| lock.is_held_by(user_id))
                .unwrap_or(false);
            if !held {
                return Err(DomainError::conflict("Priced ticket is no longer locked by the buyer")
                    .with_detail("ticket_id", id.to_string()));
            }
            sold.push(state.ticket(*id)?.transitioned(TicketState::Sold, now)?);
        }

        let mut sold_ids = Vec::with_capacity(sold.len());
        for ticket in sold {
            state.locks.remove(&ticket.id());
            sold_ids.push(ticket.id());
            state.tickets.insert(ticket.id(), ticket);
        }
        state.sessions.remove(user_id);
        sold_ids.sort();
        Ok(FulfillOutcome::Fulfilled { sold: sold_ids })
    }

    async fn delete_by_session_id(
        &self,
        session_id: &PaymentSessionId,
    ) -> Result<bool, DomainError> {
        let mut state = self.state()?;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| &s.session_id != session_id);
        Ok(state.sessions.len() < before)
    }

    async fn find_due(
        &self,
        cutoff: Timestamp,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<CheckoutSession>, DomainError> {
        let state = self.state()?;
        let mut sessions: Vec<CheckoutSession> = state
            .sessions
            .values()
            .filter(|s| s.created_at.is_before(&cutoff) && s.is_due_at(now))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| (s.due_since(), s.created_at));
        sessions.truncate(limit as usize);
        Ok(sessions)
    }

    async fn defer(
        &self,
        session_id: &PaymentSessionId,
        until: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut state = self.state()?;
        match state.sessions.values_mut().find(|s| &s.session_id == session_id) {
            Some(session) => {
                session.next_check_at = Some(until);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CatalogReader for InMemoryStore {
    async fn get_schedule(&self, id: ScheduleId) -> Result<Option<ScheduleInfo>, DomainError> {
        Ok(self.state()?.schedules.get(&id).cloned())
    }

    async fn get_hall(&self, id: HallId) -> Result<Option<HallInfo>, DomainError> {
        let state = self.state()?;
        Ok(state.halls.get(&id).and_then(|hall| {
            state.cinemas.get(&hall.cinema_id).map(|cinema| HallInfo {
                id,
                cinema_id: hall.cinema_id,
                owner_id: cinema.owner_id.clone(),
                seat_price: hall.seat_price,
            })
        }))
    }

    async fn seats_for_hall(&self, id: HallId) -> Result<Vec<SeatInfo>, DomainError> {
        let state = self.state()?;
        let mut seats: Vec<SeatInfo> = state
            .seats
            .values()
            .filter(|s| s.hall_id == id)
            .cloned()
            .collect();
        seats.sort_by_key(|s| (s.row, s.number));
        Ok(seats)
    }
}

#[async_trait]
impl AuthTokenStore for InMemoryStore {
    async fn delete_expired(&self, now: Timestamp) -> Result<u64, DomainError> {
        let mut state = self.state()?;
        let before = state.tokens.len();
        state.tokens.retain(|expires_at| !expires_at.is_before(&now));
        Ok((before - state.tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        store: InMemoryStore,
        schedule_id: ScheduleId,
        seats: Vec<SeatId>,
        now: Timestamp,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let now = Timestamp::now();
        let cinema = store.add_cinema(UserId::new("owner").unwrap(), "Odeon");
        let hall = store.add_hall(cinema, "Hall 1", Money::from_cents(200).unwrap());
        let seats = store.add_seats(hall, 2, 3);
        let movie = store.add_movie("Alien");
        let schedule_id =
            store.add_schedule(hall, movie, now.plus_secs(3600), Money::from_cents(1000).unwrap());
        Fixture {
            store,
            schedule_id,
            seats,
            now,
        }
    }

    async fn create_tickets(f: &Fixture) -> u64 {
        f.store
            .create_all_for_schedule(CreateTickets {
                schedule_id: f.schedule_id,
                seat_ids: f.seats.clone(),
                price: Money::from_cents(1200).unwrap(),
                now: f.now,
            })
            .await
            .unwrap()
    }

    fn lock_request(ticket: &Ticket, user: &str, now: Timestamp) -> LockTicket {
        LockTicket {
            ticket_id: ticket.id(),
            user_id: UserId::new(user).unwrap(),
            expected_version: Some(ticket.version()),
            now,
            expires_at: now.plus_secs(900),
        }
    }

    #[tokio::test]
    async fn create_all_is_idempotent() {
        let f = fixture();
        assert_eq!(create_tickets(&f).await, 6);
        assert_eq!(create_tickets(&f).await, 0);
        assert_eq!(f.store.tickets_for(f.schedule_id).len(), 6);
    }

    #[tokio::test]
    async fn listing_is_ordered_by_seat() {
        let f = fixture();
        create_tickets(&f).await;
        let rows = f.store.list_for_schedule(f.schedule_id).await.unwrap();
        let positions: Vec<(i32, i32)> = rows.iter().map(|r| (r.row, r.number)).collect();
        assert_eq!(positions, vec![(1, 1), (1, 2), (1, 3), (2, 1), (2, 2), (2, 3)]);
    }

    #[tokio::test]
    async fn lock_creates_ownership_record() {
        let f = fixture();
        create_tickets(&f).await;
        let ticket = f.store.tickets_for(f.schedule_id)[0].clone();

        let locked = f.store.lock(lock_request(&ticket, "alice", f.now)).await.unwrap();

        assert_eq!(locked.state(), TicketState::Locked);
        assert_eq!(locked.version(), ticket.version() + 1);
        let lock = f.store.lock_for(ticket.id()).unwrap();
        assert_eq!(lock.user_id.as_str(), "alice");
    }

    #[tokio::test]
    async fn stale_version_does_not_lock() {
        let f = fixture();
        create_tickets(&f).await;
        let ticket = f.store.tickets_for(f.schedule_id)[0].clone();
        let mut request = lock_request(&ticket, "alice", f.now);
        request.expected_version = Some(7);

        let err = f.store.lock(request).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::VersionMismatch);
        assert_eq!(f.store.lock_count(), 0);
    }

    #[tokio::test]
    async fn unlock_by_other_user_is_forbidden() {
        let f = fixture();
        create_tickets(&f).await;
        let ticket = f.store.tickets_for(f.schedule_id)[0].clone();
        f.store.lock(lock_request(&ticket, "alice", f.now)).await.unwrap();

        let err = f
            .store
            .unlock(UnlockTicket {
                ticket_id: ticket.id(),
                user_id: UserId::new("bob").unwrap(),
                expected_version: None,
                now: f.now,
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::Forbidden);
        assert!(f.store.lock_for(ticket.id()).is_some());
    }

    #[tokio::test]
    async fn sweep_respects_limit_and_sessions() {
        let f = fixture();
        create_tickets(&f).await;
        let tickets = f.store.tickets_for(f.schedule_id);
        for (i, t) in tickets.iter().enumerate().take(3) {
            let user = if i == 0 { "carol" } else { "dave" };
            f.store.lock(lock_request(t, user, f.now)).await.unwrap();
        }
        f.store
            .create(&CheckoutSession::new(
                UserId::new("carol").unwrap(),
                PaymentSessionId::new("cs_carol").unwrap(),
                None,
                vec![tickets[0].id()],
                f.now,
            ))
            .await
            .unwrap();

        let later = f.now.plus_secs(901);
        let first = f.store.unlock_all_expired(later, 1).await.unwrap();
        let second = f.store.unlock_all_expired(later, 10).await.unwrap();

        assert_eq!(first.released.len(), 1);
        assert_eq!(second.released.len(), 1);
        // carol's ticket is frozen by her checkout
        assert_eq!(f.store.lock_count(), 1);
        assert!(f.store.lock_for(tickets[0].id()).is_some());
    }

    #[tokio::test]
    async fn delete_expired_tokens_keeps_live_ones() {
        let store = InMemoryStore::new();
        let now = Timestamp::now();
        store.add_auth_token(now.plus_secs(-10));
        store.add_auth_token(now.plus_secs(10));

        assert_eq!(store.delete_expired(now).await.unwrap(), 1);
        assert_eq!(store.auth_token_count(), 1);
    }

    fn session_for(user: &str, session: &str, tickets: Vec<TicketId>, at: Timestamp) -> CheckoutSession {
        CheckoutSession::new(
            UserId::new(user).unwrap(),
            PaymentSessionId::new(session).unwrap(),
            None,
            tickets,
            at,
        )
    }

    #[tokio::test]
    async fn create_rejects_a_lock_that_was_not_priced() {
        let f = fixture();
        create_tickets(&f).await;
        let tickets = f.store.tickets_for(f.schedule_id);
        f.store.lock(lock_request(&tickets[0], "alice", f.now)).await.unwrap();
        f.store.lock(lock_request(&tickets[1], "alice", f.now)).await.unwrap();

        let err = f
            .store
            .create(&session_for("alice", "cs_1", vec![tickets[0].id()], f.now))
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(f.store.session_count(), 0);
    }

    #[tokio::test]
    async fn fulfill_sells_only_the_priced_set() {
        let f = fixture();
        create_tickets(&f).await;
        let tickets = f.store.tickets_for(f.schedule_id);
        f.store.lock(lock_request(&tickets[0], "alice", f.now)).await.unwrap();
        f.store
            .create(&session_for("alice", "cs_1", vec![tickets[0].id()], f.now))
            .await
            .unwrap();
        // A lock that slipped past the checkout freeze.
        {
            let mut state = f.store.state_recovered();
            let ticket = tickets[1].transitioned(TicketState::Locked, f.now).unwrap();
            state.locks.insert(
                ticket.id(),
                TicketLock::new(ticket.id(), UserId::new("alice").unwrap(), f.now.plus_secs(900)),
            );
            state.tickets.insert(ticket.id(), ticket);
        }

        let outcome = f
            .store
            .fulfill(
                &PaymentSessionId::new("cs_1").unwrap(),
                &UserId::new("alice").unwrap(),
                f.now,
            )
            .await
            .unwrap();

        assert_eq!(outcome, FulfillOutcome::Fulfilled { sold: vec![tickets[0].id()] });
        let second = f.store.find_by_id(tickets[1].id()).await.unwrap().unwrap();
        assert_eq!(second.state(), TicketState::Locked);
        assert!(f.store.lock_for(tickets[1].id()).is_some());
    }

    #[tokio::test]
    async fn fulfill_fails_when_a_priced_ticket_is_not_held() {
        let f = fixture();
        create_tickets(&f).await;
        let tickets = f.store.tickets_for(f.schedule_id);
        f.store.lock(lock_request(&tickets[0], "alice", f.now)).await.unwrap();
        f.store
            .create(&session_for("alice", "cs_1", vec![tickets[0].id()], f.now))
            .await
            .unwrap();
        f.store.state_recovered().locks.clear();

        let err = f
            .store
            .fulfill(
                &PaymentSessionId::new("cs_1").unwrap(),
                &UserId::new("alice").unwrap(),
                f.now,
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(f.store.session_count(), 1);
    }

    #[tokio::test]
    async fn deferred_sessions_drop_out_of_the_due_queue() {
        let store = InMemoryStore::new();
        let now = Timestamp::now();
        for (i, user) in ["alice", "bob", "carol"].iter().enumerate() {
            let created = now.plus_secs(-3600 + i as i64 * 60);
            store
                .create(&session_for(user, &format!("cs_{}", user), Vec::new(), created))
                .await
                .unwrap();
        }
        let cutoff = now.plus_secs(-1800);

        let first = store.find_due(cutoff, now, 2).await.unwrap();
        let users: Vec<&str> = first.iter().map(|s| s.user_id.as_str()).collect();
        assert_eq!(users, vec!["alice", "bob"]);

        let alice = PaymentSessionId::new("cs_alice").unwrap();
        assert!(store.defer(&alice, now.plus_secs(600)).await.unwrap());
        let second = store.find_due(cutoff, now, 2).await.unwrap();
        let users: Vec<&str> = second.iter().map(|s| s.user_id.as_str()).collect();
        assert_eq!(users, vec!["bob", "carol"]);

        // Once due again, a deferred session queues behind older work.
        let later = now.plus_secs(600);
        let third = store.find_due(cutoff, later, 3).await.unwrap();
        let users: Vec<&str> = third.iter().map(|s| s.user_id.as_str()).collect();
        assert_eq!(users, vec!["bob", "carol", "alice"]);

        assert!(!store
            .defer(&PaymentSessionId::new("cs_nobody").unwrap(), later)
            .await
            .unwrap());
    }

    #[test]
    fn seeding_survives_a_poisoned_mutex() {
        let store = InMemoryStore::new();
        let panicked = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _guard = store.state.lock().unwrap();
                    panic!("writer panicked while holding the store");
                })
                .join()
        });
        assert!(panicked.is_err());
        assert!(store.state.is_poisoned());

        let cinema = store.add_cinema(UserId::new("owner").unwrap(), "Odeon");
        let hall = store.add_hall(cinema, "Hall 1", Money::ZERO);
        let seats = store.add_seats(hall, 1, 2);
        store.add_auth_token(Timestamp::now());

        assert_eq!(seats.len(), 2);
        assert_eq!(store.auth_token_count(), 1);
        let state = store.state_recovered();
        assert!(state.cinemas.contains_key(&cinema));
        assert!(state.halls.contains_key(&hall));
        assert_eq!(state.seats.len(), 2);
    }
}
