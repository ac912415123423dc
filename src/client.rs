use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use stacks_arcade::{
    activity::{
        ActivityLog,
        ActivityRecord,
    },
    api::{
        ReadOnlyCaller,
        StacksApi,
    },
    config::Config,
    contract::{
        ContractCall,
        Contracts,
        Direction,
    },
    decode::{
        GameState,
        LeaderboardEntry,
    },
    network::Network,
    provider::{
        ConnectOptions,
        TxId,
        WalletProvider,
    },
    queries,
    reflex::{
        ClickResult,
        ReflexGame,
        ReflexPhase,
    },
    session::Session,
    storage::SessionStore,
    wallets::{
        self,
        KeystoreWallet,
    },
};
use std::{
    future::Future,
    path::PathBuf,
    pin::Pin,
    time::{
        Duration,
        Instant,
    },
};
use tokio::time::{
    self,
    MissedTickBehavior,
};
use tracing::{
    error,
    info,
    warn,
};

pub const LEADERBOARD_REFRESH: Duration = Duration::from_secs(15);
pub const LEADERBOARD_SIZE: usize = 10;
const LEADERBOARD_TIMEOUT: Duration = Duration::from_secs(10);
const NOTICE_TTL: Duration = Duration::from_secs(6);
const MAX_NOTICES: usize = 4;

pub struct AppConfig {
    pub network: Network,
    pub wallet_name: String,
    pub wallet_dir: PathBuf,
    pub session_file: PathBuf,
    pub settings: Config,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub wallet_name: String,
    pub address: Option<String>,
    pub network: Option<Network>,
    pub fallback_network: Network,
    pub reflex: ReflexPhase,
    pub best_score: Option<u64>,
    pub game_state: Option<GameState>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub activity: Vec<ActivityRecord>,
    pub status: String,
    pub notices: Vec<String>,
}

/// A leaderboard read that owns its inputs.
pub type LeaderboardFetch = Pin<Box<dyn Future<Output = Result<Vec<LeaderboardEntry>>>>>;

struct Notice {
    message: String,
    at: Instant,
}

pub struct AppController<W, R> {
    session: Session<W>,
    reader: R,
    contracts: Contracts,
    fallback_network: Network,
    wallet_name: String,
    reflex: ReflexGame,
    best_score: Option<u64>,
    game_state: Option<GameState>,
    leaderboard: Vec<LeaderboardEntry>,
    activity: ActivityLog,
    status: String,
    notices: Vec<Notice>,
}

impl<W: WalletProvider, R: ReadOnlyCaller> AppController<W, R> {
    pub fn new(
        session: Session<W>,
        reader: R,
        contracts: Contracts,
        fallback_network: Network,
        wallet_name: impl Into<String>,
    ) -> Self {
        let status = match session.address() {
            Some(address) => format!("Restored session for {address}"),
            None => String::from("Press w to connect a wallet"),
        };
        Self {
            session,
            reader,
            contracts,
            fallback_network,
            wallet_name: wallet_name.into(),
            reflex: ReflexGame::new(),
            best_score: None,
            game_state: None,
            leaderboard: Vec::new(),
            activity: ActivityLog::new(),
            status,
            notices: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session<W> {
        &self.session
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    fn notify(&mut self, message: impl Into<String>) {
        self.notices.push(Notice {
            message: message.into(),
            at: Instant::now(),
        });
        if self.notices.len() > MAX_NOTICES {
            let excess = self.notices.len() - MAX_NOTICES;
            self.notices.drain(..excess);
        }
    }

    /// Network used for reads that do not need an account.
    fn read_network(&self) -> Network {
        self.session.network().unwrap_or(self.fallback_network)
    }

    pub async fn connect(&mut self) {
        self.set_status("Connecting wallet...");
        self.session.connect().await;
        match self.session.address().map(str::to_string) {
            Some(address) => {
                self.set_status(format!("Connected as {address}"));
                self.refresh_account().await;
                self.refresh_leaderboard().await;
            }
            None => self.set_status("Wallet not connected"),
        }
    }

    pub fn disconnect(&mut self) {
        self.session.disconnect();
        self.game_state = None;
        self.best_score = None;
        self.set_status("Wallet disconnected");
    }

    pub fn reflex_click(&mut self, now: Instant) {
        let status = match self.reflex.click(now) {
            ClickResult::Started => String::from("Wait for green..."),
            ClickResult::TooEarly => String::from("Too early! Press space to try again"),
            ClickResult::Measured(ms) => format!("Reaction time: {ms} ms (s to submit)"),
        };
        self.set_status(status);
    }

    /// Returns true when the round changed phase.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.reflex.tick(now)
    }

    pub async fn submit_score(&mut self) {
        let Some(score) = self.reflex.submittable_score() else {
            self.set_status("Finish a reflex round before submitting");
            return;
        };
        let Some(network) = self.session.network() else {
            self.set_status("Connect a wallet first");
            return;
        };
        let call = self.contracts.submit_score(network, score);
        if self.submit(call).await.is_some() {
            self.reflex.reset();
            self.refresh_best_score().await;
            self.refresh_leaderboard().await;
        }
    }

    pub async fn record_activity(&mut self) {
        let Some(network) = self.session.network() else {
            self.set_status("Connect a wallet first");
            return;
        };
        let call = self.contracts.record_activity(network);
        self.submit(call).await;
    }

    pub async fn start_game(&mut self) {
        let Some(network) = self.session.network() else {
            self.set_status("Connect a wallet first");
            return;
        };
        let call = self.contracts.start_game(network);
        if self.submit(call).await.is_some() {
            self.refresh_game_state().await;
        }
    }

    pub async fn move_snake(&mut self, direction: Direction) {
        let Some(network) = self.session.network() else {
            self.set_status("Connect a wallet first");
            return;
        };
        let call = self.contracts.move_snake(network, direction.code());
        if self.submit(call).await.is_some() {
            self.refresh_game_state().await;
        }
    }

    pub async fn move_batch(&mut self, directions: Vec<Direction>) {
        if directions.is_empty() {
            self.set_status("No moves queued");
            return;
        }
        let Some(network) = self.session.network() else {
            self.set_status("Connect a wallet first");
            return;
        };
        let calls: Vec<ContractCall> = directions
            .iter()
            .map(|d| self.contracts.move_snake(network, d.code()))
            .collect();
        let labels: Vec<String> = calls.iter().map(ContractCall::label).collect();
        let total = calls.len();

        let outcome = self.session.dispatch_batch(calls).await;
        for (tx_id, label) in outcome.tx_ids.iter().zip(&labels) {
            self.activity.record(tx_id.clone(), label.clone());
        }
        let sent = outcome.tx_ids.len();
        match outcome.halted_at {
            None => self.set_status(format!("Submitted {sent} of {total} moves")),
            Some(step) => {
                warn!(step, total, "move batch halted");
                self.set_status(format!(
                    "Submitted {sent} of {total} moves; move {} cancelled or failed",
                    step + 1
                ));
            }
        }
        if sent > 0 {
            self.refresh_game_state().await;
        }
    }

    async fn submit(&mut self, call: ContractCall) -> Option<TxId> {
        let label = call.label();
        match self.session.dispatch(call).await {
            Some(tx_id) => {
                info!(%tx_id, %label, "transaction submitted");
                self.activity.record(tx_id.clone(), label.clone());
                self.set_status(format!("{label} submitted: {tx_id}"));
                Some(tx_id)
            }
            None => {
                self.set_status(format!("{label}: cancelled or failed"));
                None
            }
        }
    }

    pub async fn refresh_all(&mut self) {
        self.refresh_account().await;
        self.refresh_leaderboard().await;
    }

    pub async fn refresh_account(&mut self) {
        self.refresh_game_state().await;
        self.refresh_best_score().await;
    }

    pub async fn refresh_game_state(&mut self) {
        let (Some(address), Some(network)) = (
            self.session.address().map(str::to_string),
            self.session.network(),
        ) else {
            self.game_state = None;
            return;
        };
        match queries::fetch_game_state(&self.reader, &self.contracts, network, &address)
            .await
        {
            Ok(state) => self.game_state = state,
            Err(err) => {
                error!(error = %err, "game state read failed");
                self.game_state = None;
                self.notify("Could not load game state");
            }
        }
    }

    pub async fn refresh_best_score(&mut self) {
        let (Some(address), Some(network)) = (
            self.session.address().map(str::to_string),
            self.session.network(),
        ) else {
            self.best_score = None;
            return;
        };
        match queries::fetch_best_score(&self.reader, &self.contracts, network, &address)
            .await
        {
            Ok(best) => self.best_score = Some(best),
            Err(err) => {
                error!(error = %err, "best score read failed");
                self.best_score = None;
                self.notify("Could not load best score");
            }
        }
    }

    pub async fn refresh_leaderboard(&mut self) {
        let network = self.read_network();
        let result = queries::fetch_leaderboard(&self.reader, &self.contracts, network).await;
        self.apply_leaderboard(result);
    }

    pub fn apply_leaderboard(&mut self, result: Result<Vec<LeaderboardEntry>>) {
        match result {
            Ok(entries) => self.leaderboard = entries,
            Err(err) => {
                error!(error = %err, "leaderboard read failed");
                self.leaderboard.clear();
                self.notify("Could not load leaderboard");
            }
        }
    }

    pub fn snapshot(&mut self, now: Instant) -> AppSnapshot {
        self.notices
            .retain(|n| now.saturating_duration_since(n.at) < NOTICE_TTL);
        AppSnapshot {
            wallet_name: self.wallet_name.clone(),
            address: self.session.address().map(str::to_string),
            network: self.session.network(),
            fallback_network: self.fallback_network,
            reflex: self.reflex.phase(),
            best_score: self.best_score,
            game_state: self.game_state,
            leaderboard: self
                .leaderboard
                .iter()
                .take(LEADERBOARD_SIZE)
                .cloned()
                .collect(),
            activity: self.activity.iter().cloned().collect(),
            status: self.status.clone(),
            notices: self.notices.iter().map(|n| n.message.clone()).collect(),
        }
    }
}

impl<W: WalletProvider, R: ReadOnlyCaller + Clone + 'static> AppController<W, R> {
    /// Starts a leaderboard read that does not hold the controller, so the
    /// loop keeps handling input while it is in flight.
    pub fn leaderboard_fetch(&self) -> LeaderboardFetch {
        let reader = self.reader.clone();
        let contracts = self.contracts.clone();
        let network = self.read_network();
        Box::pin(async move {
            let read = queries::fetch_leaderboard(&reader, &contracts, network);
            match time::timeout(LEADERBOARD_TIMEOUT, read).await {
                Ok(result) => result,
                Err(_) => Err(eyre!(
                    "leaderboard read timed out after {}s",
                    LEADERBOARD_TIMEOUT.as_secs()
                )),
            }
        })
    }
}

type AppWallet = KeystoreWallet<ui::TerminalPrompt, StacksApi>;

pub async fn run_app(config: AppConfig) -> Result<()> {
    let api = StacksApi::from_config(&config.settings)?;
    info!(%api, network = %config.network, "node endpoints");
    let descriptor = wallets::find_wallet(&config.wallet_dir, &config.wallet_name)?;
    let wallet: AppWallet = KeystoreWallet::new(
        descriptor,
        config.network,
        SessionStore::new(config.session_file.clone()),
        api.clone(),
        config.settings.tx_fee,
        ui::TerminalPrompt,
    );
    let options = ConnectOptions {
        wallet_connect_project_id: config.settings.wallet_connect_project_id.clone(),
    };
    let session = Session::restore(wallet, options);
    let controller = AppController::new(
        session,
        api,
        config.settings.contracts.clone(),
        config.network,
        config.wallet_name.clone(),
    );

    let mut ui_state = ui::UiState::default();
    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(controller, &mut ui_state).await;
    ui::terminal_exit()?;
    res
}

fn redraw<W: WalletProvider, R: ReadOnlyCaller>(
    controller: &mut AppController<W, R>,
    ui_state: &mut ui::UiState,
    context: &'static str,
) -> Result<()> {
    let snapshot = controller.snapshot(Instant::now());
    ui::draw(ui_state, &snapshot).wrap_err(context)
}

/// Shows a progress message before an action that may hand the terminal
/// to a prompt.
fn show_processing_status<W: WalletProvider, R: ReadOnlyCaller>(
    controller: &mut AppController<W, R>,
    ui_state: &mut ui::UiState,
    message: impl Into<String>,
    context: &'static str,
) -> Result<()> {
    controller.set_status(message);
    redraw(controller, ui_state, context)
}

async fn run_loop<W: WalletProvider, R: ReadOnlyCaller + Clone + 'static>(
    mut controller: AppController<W, R>,
    ui_state: &mut ui::UiState,
) -> Result<()> {
    info!("Running app loop");
    redraw(&mut controller, ui_state, "initial draw failed")?;
    controller.refresh_account().await;

    let mut leaderboard_timer = time::interval(LEADERBOARD_REFRESH);
    leaderboard_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut leaderboard_fetch: Option<LeaderboardFetch> = None;

    loop {
        tokio::select! {
            _ = leaderboard_timer.tick(), if leaderboard_fetch.is_none() => {
                leaderboard_fetch = Some(controller.leaderboard_fetch());
            }
            Some(result) = async {
                match leaderboard_fetch.as_mut() {
                    Some(fetch) => Some(fetch.await),
                    None => None,
                }
            }, if leaderboard_fetch.is_some() => {
                leaderboard_fetch = None;
                controller.apply_leaderboard(result);
                redraw(&mut controller, ui_state, "draw after leaderboard refresh failed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            ev = ui::next_event(ui_state) => {
                let mut wallet_interaction = false;
                match ev? {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::Tick => {
                        if !controller.tick(Instant::now()) {
                            continue;
                        }
                    }
                    ui::UserEvent::ReflexClick => controller.reflex_click(Instant::now()),
                    ui::UserEvent::Connect => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            "Unlocking wallet...",
                            "draw while connecting failed",
                        )?;
                        controller.connect().await;
                        wallet_interaction = true;
                    }
                    ui::UserEvent::Disconnect => controller.disconnect(),
                    ui::UserEvent::SubmitScore => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            "Submitting score...",
                            "draw while submitting score failed",
                        )?;
                        controller.submit_score().await;
                        wallet_interaction = true;
                    }
                    ui::UserEvent::RecordActivity => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            "Recording activity...",
                            "draw while recording activity failed",
                        )?;
                        controller.record_activity().await;
                        wallet_interaction = true;
                    }
                    ui::UserEvent::StartGame => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            "Starting snake game...",
                            "draw while starting game failed",
                        )?;
                        controller.start_game().await;
                        wallet_interaction = true;
                    }
                    ui::UserEvent::Move(direction) => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            format!("Moving {}...", direction.arrow()),
                            "draw while moving failed",
                        )?;
                        controller.move_snake(direction).await;
                        wallet_interaction = true;
                    }
                    ui::UserEvent::SubmitMoves(directions) => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            format!("Submitting {} queued moves...", directions.len()),
                            "draw while submitting moves failed",
                        )?;
                        controller.move_batch(directions).await;
                        wallet_interaction = true;
                    }
                    ui::UserEvent::Refresh => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            "Refreshing...",
                            "draw while refreshing failed",
                        )?;
                        controller.refresh_all().await;
                        controller.set_status("Refreshed");
                    }
                }
                if wallet_interaction {
                    ui::reset_terminal(ui_state)?;
                }
                redraw(&mut controller, ui_state, "draw after input failed")?;
            }
        }
    }
    info!("Leaving app loop");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use stacks_arcade::{
        clarity::ClarityValue,
        contract::{
            ContractId,
            GET_BEST_SCORE,
            GET_LEADERBOARD,
            GET_STATE,
        },
        test_helpers::{
            FakeReader,
            FakeWallet,
        },
    };

    const ADDRESS: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

    fn controller(
        wallet: FakeWallet,
        reader: FakeReader,
    ) -> AppController<FakeWallet, FakeReader> {
        let contracts = Contracts::new(
            ContractId::new(ADDRESS, "activity"),
            ContractId::new(ADDRESS, "reflex"),
        );
        AppController::new(
            Session::restore(wallet, ConnectOptions::default()),
            reader,
            contracts,
            Network::Testnet,
            "alice",
        )
    }

    fn live_state() -> ClarityValue {
        ClarityValue::some(ClarityValue::tuple([
            ("x", ClarityValue::UInt(5)),
            ("y", ClarityValue::UInt(5)),
            ("score", ClarityValue::UInt(0)),
            ("alive", ClarityValue::Bool(true)),
        ]))
    }

    #[tokio::test]
    async fn start_game__records_activity_and_refreshes_state() {
        // given
        let reader = FakeReader::new().respond(GET_STATE, live_state());
        let mut controller = controller(
            FakeWallet::connected_as(ADDRESS).approving("0xfeed"),
            reader,
        );

        // when
        controller.start_game().await;

        // then
        let snap = controller.snapshot(Instant::now());
        assert_eq!(snap.activity.len(), 1);
        assert_eq!(snap.activity[0].label, "start-game");
        assert_eq!(
            snap.game_state,
            Some(GameState {
                x: 5,
                y: 5,
                score: 0,
                alive: true
            })
        );
    }

    #[tokio::test]
    async fn start_game__cancel_reports_cancelled_or_failed() {
        // given
        let mut controller =
            controller(FakeWallet::connected_as(ADDRESS).cancelling(), FakeReader::new());

        // when
        controller.start_game().await;

        // then
        assert!(controller.status().contains("cancelled or failed"));
        assert!(controller.snapshot(Instant::now()).activity.is_empty());
    }

    #[tokio::test]
    async fn refresh_game_state__read_failure_degrades_with_notice() {
        // given
        let reader = FakeReader::new().fail(GET_STATE, "timeout");
        let mut controller = controller(FakeWallet::connected_as(ADDRESS), reader);

        // when
        controller.refresh_game_state().await;

        // then
        let snap = controller.snapshot(Instant::now());
        assert_eq!(snap.game_state, None);
        assert_eq!(snap.notices, vec!["Could not load game state".to_string()]);
    }

    #[tokio::test]
    async fn snapshot__notices_expire() {
        let reader = FakeReader::new().fail(GET_LEADERBOARD, "timeout");
        let mut controller = controller(FakeWallet::new(), reader);
        controller.refresh_leaderboard().await;
        let later = Instant::now() + NOTICE_TTL + Duration::from_secs(1);
        assert!(controller.snapshot(later).notices.is_empty());
    }

    #[tokio::test]
    async fn move_batch__records_sent_moves_and_reports_halt() {
        // given
        let reader = FakeReader::new().respond(GET_STATE, live_state());
        let wallet = FakeWallet::connected_as(ADDRESS)
            .approving("0x01")
            .failing("rejected");
        let mut controller = controller(wallet, reader);

        // when
        controller
            .move_batch(vec![Direction::Right, Direction::Down, Direction::Left])
            .await;

        // then
        let snap = controller.snapshot(Instant::now());
        let labels: Vec<_> = snap.activity.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["move u1"]);
        assert_eq!(
            snap.status,
            "Submitted 1 of 3 moves; move 2 cancelled or failed"
        );
        assert_eq!(controller.session().wallet().requests().len(), 2);
    }

    #[tokio::test]
    async fn submit_score__requires_finished_round() {
        // given
        let mut controller =
            controller(FakeWallet::connected_as(ADDRESS).approving("0x01"), FakeReader::new());

        // when
        controller.submit_score().await;

        // then
        assert!(controller.session().wallet().requests().is_empty());
    }

    #[tokio::test]
    async fn submit_score__refreshes_best_and_leaderboard() {
        // given
        let entry = ClarityValue::tuple([
            ("who", ClarityValue::principal("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7").unwrap()),
            ("score", ClarityValue::UInt(180)),
        ]);
        let reader = FakeReader::new()
            .respond(GET_BEST_SCORE, ClarityValue::some(ClarityValue::UInt(180)))
            .respond(GET_LEADERBOARD, ClarityValue::List(vec![entry]));
        let mut controller =
            controller(FakeWallet::connected_as(ADDRESS).approving("0x01"), reader);
        let start = Instant::now();
        controller.reflex.click_with_delay(start, Duration::from_millis(1_500));
        controller.tick(start + Duration::from_millis(1_500));
        controller
            .reflex
            .click_with_delay(start + Duration::from_millis(1_680), Duration::ZERO);

        // when
        controller.submit_score().await;

        // then
        let snap = controller.snapshot(Instant::now());
        assert_eq!(snap.best_score, Some(180));
        assert_eq!(snap.leaderboard.len(), 1);
        assert_eq!(snap.activity[0].label, "submit-score u180");
        assert_eq!(snap.reflex, ReflexPhase::Idle);
    }

    #[tokio::test]
    async fn leaderboard_fetch__leaves_controller_free_for_input() {
        // given
        let entry = ClarityValue::tuple([
            ("who", ClarityValue::principal("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7").unwrap()),
            ("score", ClarityValue::UInt(240)),
        ]);
        let reader =
            FakeReader::new().respond(GET_LEADERBOARD, ClarityValue::List(vec![entry]));
        let mut controller = controller(FakeWallet::new(), reader);
        let start = Instant::now();

        // when
        let fetch = controller.leaderboard_fetch();
        controller.reflex_click(start);
        controller.tick(start + Duration::from_secs(10));
        let result = fetch.await;
        controller.apply_leaderboard(result);

        // then
        let snap = controller.snapshot(Instant::now());
        assert!(matches!(snap.reflex, ReflexPhase::Go { .. }));
        assert_eq!(snap.leaderboard.len(), 1);
        assert_eq!(snap.leaderboard[0].score, 240);
        assert!(snap.notices.is_empty());
    }

    #[tokio::test]
    async fn apply_leaderboard__failure_clears_board_with_notice() {
        // given
        let mut controller = controller(FakeWallet::new(), FakeReader::new());

        // when
        controller.apply_leaderboard(Err(eyre!("leaderboard read timed out after 10s")));

        // then
        let snap = controller.snapshot(Instant::now());
        assert!(snap.leaderboard.is_empty());
        assert_eq!(snap.notices, vec!["Could not load leaderboard".to_string()]);
    }

    #[tokio::test]
    async fn record_activity__without_wallet_asks_to_connect() {
        let mut controller = controller(FakeWallet::new(), FakeReader::new());
        controller.record_activity().await;
        assert_eq!(controller.status(), "Connect a wallet first");
    }

    #[tokio::test]
    async fn disconnect__clears_account_views() {
        // given
        let reader = FakeReader::new()
            .respond(GET_STATE, live_state())
            .respond(GET_BEST_SCORE, ClarityValue::UInt(200));
        let mut controller = controller(FakeWallet::connected_as(ADDRESS), reader);
        controller.refresh_account().await;

        // when
        controller.disconnect();

        // then
        let snap = controller.snapshot(Instant::now());
        assert_eq!(snap.address, None);
        assert_eq!(snap.game_state, None);
        assert_eq!(snap.best_score, None);
    }
}
