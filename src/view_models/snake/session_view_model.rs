//! Runs one [`Session`] behind a message loop.
//!
//! Commands, votes and timer callbacks all arrive as [`ChannelMessage`]s on one
//! channel, so session mutations never interleave. Replies go out before any
//! display call is awaited.
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        oneshot,
    },
    task::JoinHandle,
    time::Instant,
};

use crate::{
    display::{ChatDisplay, DisplayContent},
    models::snake::{
        snake_direction::Direction,
        snake_error::{Result, SnakeError},
        snake_params::GameParams,
        snake_session::{
            RoundResolution, Session, SessionSnapshot, SessionState, StartOutcome, StopOutcome,
            VoteRejection,
        },
        vote_tally::{VoteOutcome, VoterId},
    },
    views::snake::snake_screen,
};

use super::round_scheduler::{RoundScheduler, TimerKind};

/// How long [`SessionViewModel::shutdown`] waits before aborting the loop.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
/// Longest the loop waits on one send or edit before giving up on it.
pub const DISPLAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum ChannelMessage {
    Start(oneshot::Sender<Result<StartOutcome>>),
    Stop(oneshot::Sender<StopOutcome>),
    Vote {
        voter: VoterId,
        direction: Direction,
        reply: oneshot::Sender<std::result::Result<VoteOutcome, VoteRejection>>,
    },
    TimerFired {
        kind: TimerKind,
        epoch: u64,
    },
    GetSnapshot(oneshot::Sender<SessionSnapshot>),
    Kill,
}

#[derive(Debug)]
pub struct SessionViewModel {
    sender_to_main_loop: UnboundedSender<ChannelMessage>,
    main_handle: JoinHandle<()>,
}

impl SessionViewModel {
    /// Spawns the loop for a new idle session. Needs a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`SnakeError`] if `params` are invalid.
    pub fn new<D: ChatDisplay>(params: GameParams, display: D) -> Result<Self> {
        debug!("New SessionViewModel params: {params:#?}");
        Ok(Self::with_session(Session::new(params)?, display))
    }

    /// Spawns the loop around an existing session. A session that is already
    /// running gets a round opened straight away.
    #[must_use]
    pub fn with_session<D: ChatDisplay>(session: Session, display: D) -> Self {
        let (sender_to_main_loop, receiver) = mpsc::unbounded_channel();
        let main_loop = MainLoop {
            session,
            scheduler: RoundScheduler::new(),
            display,
            sender: sender_to_main_loop.clone(),
        };
        Self {
            sender_to_main_loop,
            main_handle: tokio::spawn(main_loop.run(receiver)),
        }
    }

    /// # Errors
    ///
    /// Returns [`SnakeError::SessionClosed`] if the loop is gone, or the error
    /// from building a fresh board.
    pub async fn start(&self) -> Result<StartOutcome> {
        self.request(ChannelMessage::Start).await?
    }

    /// # Errors
    ///
    /// Returns [`SnakeError::SessionClosed`] if the loop is gone.
    pub async fn stop(&self) -> Result<StopOutcome> {
        self.request(ChannelMessage::Stop).await
    }

    /// # Errors
    ///
    /// Returns a [`VoteRejection`] if the game is not accepting votes.
    pub async fn vote(
        &self,
        voter: VoterId,
        direction: Direction,
    ) -> std::result::Result<VoteOutcome, VoteRejection> {
        self.request(|reply| ChannelMessage::Vote {
            voter,
            direction,
            reply,
        })
        .await
        .unwrap_or(Err(VoteRejection::SessionClosed))
    }

    /// # Errors
    ///
    /// Returns [`SnakeError::SessionClosed`] if the loop is gone.
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(ChannelMessage::GetSnapshot).await
    }

    /// Stops the loop, aborting it if it does not finish in time.
    pub async fn shutdown(mut self) {
        if self.main_handle.is_finished() {
            return;
        }
        if let Err(e) = self.sender_to_main_loop.send(ChannelMessage::Kill) {
            error!("Error sending kill message to main: {e}");
        }
        if let Err(e) = tokio::time::timeout(SHUTDOWN_GRACE, &mut self.main_handle).await {
            error!("Error closing main loop in time. Forcing abort: {e}");
            self.main_handle.abort();
        }
    }

    async fn request<T, F>(&self, make: F) -> Result<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> ChannelMessage,
    {
        let (reply, response) = oneshot::channel();
        self.sender_to_main_loop
            .send(make(reply))
            .map_err(|_| SnakeError::SessionClosed)?;
        response.await.map_err(|_| SnakeError::SessionClosed)
    }
}

impl Drop for SessionViewModel {
    fn drop(&mut self) {
        self.main_handle.abort();
    }
}

struct MainLoop<D> {
    session: Session,
    scheduler: RoundScheduler,
    display: D,
    sender: UnboundedSender<ChannelMessage>,
}

impl<D: ChatDisplay> MainLoop<D> {
    async fn run(mut self, mut receiver: UnboundedReceiver<ChannelMessage>) {
        if self.session.state() == SessionState::Running {
            self.open_round().await;
        }
        while let Some(message) = receiver.recv().await {
            match message {
                ChannelMessage::Start(reply) => {
                    let outcome = self.session.start();
                    let started = matches!(outcome, Ok(StartOutcome::Started));
                    if let Err(e) = &outcome {
                        error!("Could not start game: {e}");
                    }
                    if reply.send(outcome).is_err() {
                        debug!("Start requester went away");
                    }
                    if started {
                        self.open_round().await;
                    }
                }
                ChannelMessage::Stop(reply) => {
                    let outcome = self.session.stop();
                    if outcome == StopOutcome::Stopped {
                        self.scheduler.cancel();
                    }
                    if reply.send(outcome).is_err() {
                        debug!("Stop requester went away");
                    }
                    if outcome == StopOutcome::Stopped {
                        let content = snake_screen::stopped_content(&self.session.snapshot());
                        self.refresh(&content).await;
                    }
                }
                ChannelMessage::Vote {
                    voter,
                    direction,
                    reply,
                } => {
                    let result = self.session.cast_vote(voter, direction);
                    debug!("Vote from {voter:?} for {direction}: {result:?}");
                    let changed = matches!(
                        result,
                        Ok(VoteOutcome::New | VoteOutcome::Changed { .. })
                    );
                    if reply.send(result).is_err() {
                        debug!("Voter {voter:?} went away before the ack");
                    }
                    if changed {
                        let content =
                            snake_screen::running_content(&self.session.snapshot(), Instant::now());
                        self.refresh(&content).await;
                    }
                }
                ChannelMessage::TimerFired { kind, epoch } => {
                    if !self.scheduler.accept(kind, epoch) {
                        continue;
                    }
                    match kind {
                        TimerKind::Round => self.resolve_round().await,
                        TimerKind::Restart => self.restart().await,
                    }
                    self.scheduler.finish();
                }
                ChannelMessage::GetSnapshot(reply) => {
                    if reply.send(self.session.snapshot()).is_err() {
                        debug!("Snapshot requester went away");
                    }
                }
                ChannelMessage::Kill => {
                    debug!("Killing main loop");
                    self.scheduler.cancel();
                    break;
                }
            }
        }
    }

    async fn open_round(&mut self) {
        let now = Instant::now();
        self.session.begin_round(now);
        let round_duration = self.session.params().round_duration;
        self.arm(TimerKind::Round, round_duration);
        let content = snake_screen::running_content(&self.session.snapshot(), now);
        self.post(&content).await;
    }

    async fn resolve_round(&mut self) {
        match self.session.resolve_round() {
            RoundResolution::Continued { direction, outcome } => {
                debug!(
                    "Move {} went {direction}: {outcome:?}",
                    self.session.move_count()
                );
                self.open_round().await;
            }
            RoundResolution::GameOver(reason) => {
                info!(
                    "Game over ({reason:?}) with score {}",
                    self.session.score()
                );
                let cooldown = self.session.params().restart_cooldown;
                self.arm(TimerKind::Restart, cooldown);
                let content = snake_screen::game_over_content(&self.session.snapshot(), cooldown);
                self.post(&content).await;
            }
            RoundResolution::NotRunning => {
                warn!("Round timer fired while the game was not running");
            }
        }
    }

    async fn restart(&mut self) {
        if self.session.state() != SessionState::GameOver {
            debug!("Skipping restart, session is {:?}", self.session.state());
            return;
        }
        match self.session.start() {
            Ok(StartOutcome::Started) => self.open_round().await,
            Ok(StartOutcome::AlreadyRunning) => {}
            Err(e) => error!("Automatic restart failed: {e}"),
        }
    }

    fn arm(&mut self, kind: TimerKind, after: Duration) {
        let sender = self.sender.clone();
        self.scheduler.arm(kind, after, move |kind, epoch| {
            if sender
                .send(ChannelMessage::TimerFired { kind, epoch })
                .is_err()
            {
                debug!("Main loop gone before {kind:?} timer fired");
            }
        });
    }

    async fn post(&mut self, content: &DisplayContent) {
        match tokio::time::timeout(DISPLAY_TIMEOUT, self.display.send_display(content)).await {
            Ok(Ok(handle)) => self.session.record_display(handle),
            Ok(Err(e)) => {
                error!("Error sending message: {e}");
                self.session.clear_display();
            }
            Err(_) => {
                error!("Sending message timed out after {DISPLAY_TIMEOUT:?}");
                self.session.clear_display();
            }
        }
    }

    async fn refresh(&self, content: &DisplayContent) {
        let Some(handle) = self.session.display_handle() else {
            debug!("Nothing on display to refresh");
            return;
        };
        match tokio::time::timeout(DISPLAY_TIMEOUT, self.display.edit_display(handle, content))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Error editing message {handle:?}: {e}"),
            Err(_) => error!("Editing message {handle:?} timed out after {DISPLAY_TIMEOUT:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Arc, Mutex,
    };

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        display::{DisplayError, DisplayHandle},
        models::snake::snake_board::Board,
    };

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        Send(DisplayHandle, DisplayContent),
        Edit(DisplayHandle, DisplayContent),
    }

    #[derive(Clone, Default)]
    struct RecordingDisplay {
        calls: Arc<Mutex<Vec<Call>>>,
        next_handle: Arc<AtomicI64>,
        fail_edits: Arc<AtomicBool>,
        fail_sends: Arc<AtomicBool>,
        hang_edits: Arc<AtomicBool>,
    }

    impl RecordingDisplay {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn sends(&self) -> Vec<DisplayContent> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Send(_, content) => Some(content),
                    Call::Edit(..) => None,
                })
                .collect()
        }

        fn edits(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::Edit(..)))
                .count()
        }
    }

    impl ChatDisplay for RecordingDisplay {
        async fn send_display(
            &self,
            content: &DisplayContent,
        ) -> std::result::Result<DisplayHandle, DisplayError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(DisplayError::Rejected("chat unavailable".to_string()));
            }
            let handle = DisplayHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
            self.calls
                .lock()
                .unwrap()
                .push(Call::Send(handle, content.clone()));
            Ok(handle)
        }

        async fn edit_display(
            &self,
            handle: DisplayHandle,
            content: &DisplayContent,
        ) -> std::result::Result<(), DisplayError> {
            if self.hang_edits.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.fail_edits.load(Ordering::SeqCst) {
                return Err(DisplayError::StaleHandle(handle));
            }
            self.calls
                .lock()
                .unwrap()
                .push(Call::Edit(handle, content.clone()));
            Ok(())
        }
    }

    fn params() -> GameParams {
        GameParams {
            width: 6,
            height: 5,
            round_duration: Duration::from_secs(300),
            restart_cooldown: Duration::from_secs(10),
        }
    }

    fn idle_session() -> Session {
        Session::with_seed(params(), 21).unwrap()
    }

    /// A running session whose snake is about to turn into itself.
    fn doomed_session() -> Session {
        let mut session = idle_session();
        session.start().unwrap();
        session.set_board(
            Board::from_parts(
                6,
                5,
                vec![(2, 2), (1, 2), (0, 2)],
                Direction::Left,
                (5, 4),
                StdRng::seed_from_u64(4),
            )
            .unwrap(),
        );
        session
    }

    async fn wait(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_posts_board_and_rejects_second_start() {
        let _ = env_logger::builder().is_test(true).try_init();
        let display = RecordingDisplay::default();
        let vm = SessionViewModel::with_session(idle_session(), display.clone());

        assert_eq!(vm.start().await, Ok(StartOutcome::Started));
        assert_eq!(vm.start().await, Ok(StartOutcome::AlreadyRunning));

        let snap = vm.snapshot().await.unwrap();
        assert_eq!(snap.state, SessionState::Running);
        assert_eq!(snap.display_handle, Some(DisplayHandle(1)));
        let sends = display.sends();
        assert_eq!(sends.len(), 1);
        assert!(sends[0].buttons.is_some());
        assert!(sends[0].text.contains("05:00"));
    }

    #[tokio::test(start_paused = true)]
    async fn votes_refresh_the_display_except_duplicates() {
        let display = RecordingDisplay::default();
        let vm = SessionViewModel::with_session(idle_session(), display.clone());
        vm.start().await.unwrap();

        assert_eq!(vm.vote(VoterId(1), Direction::Up).await, Ok(VoteOutcome::New));
        assert_eq!(
            vm.vote(VoterId(1), Direction::Up).await,
            Ok(VoteOutcome::Duplicate)
        );
        assert_eq!(
            vm.vote(VoterId(1), Direction::Down).await,
            Ok(VoteOutcome::Changed {
                from: Direction::Up
            })
        );
        let _ = vm.snapshot().await.unwrap();
        assert_eq!(display.edits(), 2);
        let Some(Call::Edit(handle, content)) = display.calls().last().cloned() else {
            panic!("expected an edit last");
        };
        assert_eq!(handle, DisplayHandle(1));
        let labels: Vec<String> = content
            .buttons
            .unwrap()
            .concat()
            .into_iter()
            .map(|b| b.label)
            .collect();
        assert!(labels.contains(&"⬇️ Down (1)".to_string()));
        assert!(labels.contains(&"⬆️ Up (0)".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn round_without_votes_moves_straight_and_posts_a_new_board() {
        let display = RecordingDisplay::default();
        let vm = SessionViewModel::with_session(idle_session(), display.clone());
        vm.start().await.unwrap();
        let head = vm.snapshot().await.unwrap().board.head();

        wait(299).await;
        assert_eq!(vm.snapshot().await.unwrap().move_count, 0);
        wait(2).await;

        let snap = vm.snapshot().await.unwrap();
        assert_eq!(snap.move_count, 1);
        assert_eq!(snap.board.head(), ((head.0 + 1) % 6, head.1));
        assert_eq!(snap.counts.total(), 0);
        assert_eq!(snap.display_handle, Some(DisplayHandle(2)));
        assert_eq!(display.sends().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn votes_are_cleared_between_rounds() {
        let display = RecordingDisplay::default();
        let vm = SessionViewModel::with_session(idle_session(), display.clone());
        vm.start().await.unwrap();
        vm.vote(VoterId(1), Direction::Up).await.unwrap();
        vm.vote(VoterId(2), Direction::Up).await.unwrap();

        wait(301).await;
        let snap = vm.snapshot().await.unwrap();
        assert_eq!(snap.board.direction(), Direction::Up);
        assert_eq!(snap.counts.total(), 0);
        // same voter may vote again in the new round
        assert_eq!(vm.vote(VoterId(1), Direction::Left).await, Ok(VoteOutcome::New));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_the_round_and_blocks_votes() {
        let display = RecordingDisplay::default();
        let vm = SessionViewModel::with_session(idle_session(), display.clone());
        assert_eq!(vm.stop().await, Ok(StopOutcome::NothingToStop));
        vm.start().await.unwrap();
        assert_eq!(vm.stop().await, Ok(StopOutcome::Stopped));
        assert_eq!(vm.stop().await, Ok(StopOutcome::NothingToStop));

        wait(1_000).await;
        let snap = vm.snapshot().await.unwrap();
        assert_eq!(snap.state, SessionState::Idle);
        assert_eq!(snap.move_count, 0);
        assert_eq!(
            vm.vote(VoterId(1), Direction::Up).await,
            Err(VoteRejection::GameNotActive)
        );
        let Some(Call::Edit(_, stopped)) = display.calls().last().cloned() else {
            panic!("expected the stop notice edit");
        };
        assert!(stopped.buttons.is_none());
        assert_eq!(display.sends().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn collision_ends_game_then_restarts_after_cooldown() {
        let _ = env_logger::builder().is_test(true).try_init();
        let display = RecordingDisplay::default();
        let vm = SessionViewModel::with_session(doomed_session(), display.clone());
        assert_eq!(
            vm.vote(VoterId(1), Direction::Right).await,
            Ok(VoteOutcome::New)
        );

        wait(301).await;
        let snap = vm.snapshot().await.unwrap();
        assert_eq!(snap.state, SessionState::GameOver);
        assert_eq!(snap.board.head(), (1, 2));
        assert_eq!(
            vm.vote(VoterId(2), Direction::Up).await,
            Err(VoteRejection::GameNotActive)
        );
        let sends = display.sends();
        let over = sends.last().unwrap();
        assert!(over.buttons.is_none());
        assert!(over.text.contains("NEW GAME IN 10 SECONDS"));

        wait(10).await;
        let snap = vm.snapshot().await.unwrap();
        assert_eq!(snap.state, SessionState::Running);
        assert_eq!(snap.score, 0);
        assert_eq!(snap.move_count, 0);
        assert_eq!(snap.board.len(), 1);
        assert!(display.sends().last().unwrap().buttons.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_cooldown_prevents_restart() {
        let display = RecordingDisplay::default();
        let vm = SessionViewModel::with_session(doomed_session(), display.clone());
        wait(301).await;
        assert_eq!(vm.snapshot().await.unwrap().state, SessionState::GameOver);
        assert_eq!(vm.stop().await, Ok(StopOutcome::Stopped));

        wait(60).await;
        assert_eq!(vm.snapshot().await.unwrap().state, SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_start_during_cooldown_wins_over_the_restart_timer() {
        let display = RecordingDisplay::default();
        let vm = SessionViewModel::with_session(doomed_session(), display.clone());
        wait(301).await;
        assert_eq!(vm.start().await, Ok(StartOutcome::Started));
        let sends_after_start = display.sends().len();

        // the cooldown would have fired here; the new round timer replaced it
        wait(20).await;
        let snap = vm.snapshot().await.unwrap();
        assert_eq!(snap.state, SessionState::Running);
        assert_eq!(snap.move_count, 0);
        assert_eq!(display.sends().len(), sends_after_start);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_edits_do_not_stop_the_game() {
        let _ = env_logger::builder().is_test(true).try_init();
        let display = RecordingDisplay::default();
        display.fail_edits.store(true, Ordering::SeqCst);
        let vm = SessionViewModel::with_session(idle_session(), display.clone());
        vm.start().await.unwrap();
        assert_eq!(vm.vote(VoterId(1), Direction::Down).await, Ok(VoteOutcome::New));

        wait(301).await;
        let snap = vm.snapshot().await.unwrap();
        assert_eq!(snap.move_count, 1);
        assert_eq!(snap.board.direction(), Direction::Down);
        assert_eq!(display.edits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_edit_times_out_and_rounds_keep_coming() {
        let _ = env_logger::builder().is_test(true).try_init();
        let display = RecordingDisplay::default();
        display.hang_edits.store(true, Ordering::SeqCst);
        let vm = SessionViewModel::with_session(idle_session(), display.clone());
        vm.start().await.unwrap();
        assert_eq!(vm.vote(VoterId(1), Direction::Up).await, Ok(VoteOutcome::New));
        // queued behind the hung edit until it times out
        assert_eq!(vm.vote(VoterId(2), Direction::Up).await, Ok(VoteOutcome::New));

        wait(901).await;
        let snap = vm.snapshot().await.unwrap();
        assert_eq!(snap.state, SessionState::Running);
        assert_eq!(snap.move_count, 3);
        assert_eq!(display.sends().len(), 4);
        assert_eq!(display.edits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sends_still_schedule_rounds() {
        let _ = env_logger::builder().is_test(true).try_init();
        let display = RecordingDisplay::default();
        let vm = SessionViewModel::with_session(idle_session(), display.clone());
        vm.start().await.unwrap();
        assert_eq!(vm.snapshot().await.unwrap().display_handle, Some(DisplayHandle(1)));

        display.fail_sends.store(true, Ordering::SeqCst);
        wait(301).await;
        let snap = vm.snapshot().await.unwrap();
        assert_eq!(snap.move_count, 1);
        // the old message shows a stale board so it is no longer edited
        assert_eq!(snap.display_handle, None);
        assert_eq!(vm.vote(VoterId(1), Direction::Down).await, Ok(VoteOutcome::New));
        assert_eq!(display.edits(), 0);

        wait(300).await;
        assert_eq!(vm.snapshot().await.unwrap().move_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sends_still_restart_after_game_over() {
        let display = RecordingDisplay::default();
        display.fail_sends.store(true, Ordering::SeqCst);
        let vm = SessionViewModel::with_session(doomed_session(), display.clone());
        assert_eq!(vm.vote(VoterId(1), Direction::Right).await, Ok(VoteOutcome::New));
        assert_eq!(display.edits(), 0);

        wait(301).await;
        let snap = vm.snapshot().await.unwrap();
        assert_eq!(snap.state, SessionState::GameOver);
        assert_eq!(snap.display_handle, None);

        wait(10).await;
        let snap = vm.snapshot().await.unwrap();
        assert_eq!(snap.state, SessionState::Running);
        assert_eq!(snap.score, 0);
        assert_eq!(snap.display_handle, None);
        assert!(display.sends().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_the_session() {
        let display = RecordingDisplay::default();
        let vm = SessionViewModel::new(params(), display).unwrap();
        vm.start().await.unwrap();
        let sender = vm.sender_to_main_loop.clone();
        vm.shutdown().await;
        assert!(sender.is_closed());
    }
}
