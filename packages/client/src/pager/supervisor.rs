//! Owns the telephony console and turns page requests into calls.

use std::time::Duration;

use tokio::{
    sync::{mpsc, watch},
    time::{Instant, sleep_until, timeout},
};

use crate::{
    config::PagerSettings,
    error::{ConsoleError, WorkerError},
    events::{ActuationStatus, PageRequest},
};

use super::console::{ConsoleLauncher, ExpectOutcome, ExpectSession};

const PROMPT: &str = ">>>";
const REGISTRATION_SUCCESS: &str = "registration success";
const MAKE_CALL_PROMPT: &str = "Make call:";
const CONFIRMED: &str = "CONFIRMED";
const DISCONNECTED: &str = "DISCONN";
/// Wait for a page request before checking the drain timer again.
const PAGE_WAIT: Duration = Duration::from_secs(1);

/// Rejects pages that come too soon after the last accepted one.
#[derive(Debug, Clone)]
pub struct PageThrottle {
    window: Duration,
    last_page: Option<Instant>,
}

impl PageThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_page: None,
        }
    }

    /// Accept a request made at `requested_at` if it is later than the last
    /// accepted page plus the window. Accepting records `now` as the last page.
    pub fn admit(&mut self, requested_at: Instant, now: Instant) -> bool {
        let admitted = self
            .last_page
            .is_none_or(|last| requested_at > last + self.window);
        if admitted {
            self.last_page = Some(now);
        }
        admitted
    }
}

pub struct PageSupervisor {
    launcher: Box<dyn ConsoleLauncher>,
    settings: PagerSettings,
    pages: mpsc::Receiver<PageRequest>,
    status: watch::Receiver<ActuationStatus>,
    throttle: PageThrottle,
}

impl PageSupervisor {
    pub fn new(
        launcher: Box<dyn ConsoleLauncher>,
        settings: PagerSettings,
        pages: mpsc::Receiver<PageRequest>,
        status: watch::Receiver<ActuationStatus>,
    ) -> Self {
        let throttle = PageThrottle::new(settings.throttle);
        Self {
            launcher,
            settings,
            pages,
            status,
            throttle,
        }
    }

    pub async fn run(mut self) -> Result<(), WorkerError> {
        tracing::info!(worker = "pager", "Starting page supervisor");
        let mut console = self.register().await?;
        let result = self.serve(&mut console).await;
        console.terminate().await;
        result
    }

    /// Launch consoles until one reports a successful registration.
    ///
    /// An attempt that times out is retried with a fresh console; a console
    /// that exits during registration is fatal.
    pub async fn register(&mut self) -> Result<ExpectSession, WorkerError> {
        loop {
            tracing::info!(worker = "pager", "Registering with the calling network");
            let mut console = self.launcher.launch()?;
            match console
                .expect(&[REGISTRATION_SUCCESS], self.settings.registration_timeout)
                .await?
            {
                ExpectOutcome::Matched(_) => {
                    tracing::info!(worker = "pager", "Registration success");
                    return Ok(console);
                }
                ExpectOutcome::Timeout => {
                    tracing::warn!(worker = "pager", "Registration failure, retrying");
                    console.terminate().await;
                }
                ExpectOutcome::Eof => {
                    console.terminate().await;
                    return Err(ConsoleError::Exited.into());
                }
            }
        }
    }

    async fn serve(&mut self, console: &mut ExpectSession) -> Result<(), WorkerError> {
        let mut last_drain = Instant::now();
        loop {
            if let Some(every) = self.settings.drain_every
                && last_drain.elapsed() >= every
            {
                last_drain = Instant::now();
                console.send_line("echo ping").await?;
                console.expect_one(PROMPT, self.settings.expect_timeout).await?;
            }

            let request = match timeout(PAGE_WAIT, self.pages.recv()).await {
                Ok(Some(request)) => request,
                Ok(None) => return Err(WorkerError::ChannelClosed("page")),
                Err(_) => continue,
            };

            self.wait_for_unlock_cycle().await;
            if self.throttle.admit(request.requested_at, Instant::now()) {
                tracing::info!(worker = "pager", "Paging {}", self.settings.paging_sip);
                self.page(console).await?;
            } else {
                tracing::info!(
                    worker = "pager",
                    "Throttled page request from {:?} ago",
                    request.requested_at.elapsed()
                );
            }
        }
    }

    /// The unlock relay disturbs the paging relay, so calls wait until the
    /// door cycle and its cooldown are over.
    async fn wait_for_unlock_cycle(&mut self) {
        loop {
            let status = *self.status.borrow();
            let Some(until) = status.paging_suspended_until else {
                return;
            };
            if !status.is_suspended(Instant::now()) {
                return;
            }
            tracing::info!(worker = "pager", "Paging suspended during unlock");
            sleep_until(until).await;
        }
    }

    async fn page(&self, console: &mut ExpectSession) -> Result<(), WorkerError> {
        let wait = self.settings.expect_timeout;
        console.send_line("h").await?;
        console.expect_one(PROMPT, wait).await?;
        console.send_line("m").await?;
        console.expect_one(MAKE_CALL_PROMPT, wait).await?;
        console.send_line(&self.settings.paging_sip).await?;

        match console.expect(&[CONFIRMED, DISCONNECTED], wait).await? {
            ExpectOutcome::Matched(0) => {}
            ExpectOutcome::Matched(_) => {
                tracing::info!(worker = "pager", "Call disconnected before confirmation");
                return Ok(());
            }
            ExpectOutcome::Timeout => {
                tracing::warn!(worker = "pager", "Call was not confirmed");
                return Ok(());
            }
            ExpectOutcome::Eof => return Err(ConsoleError::Exited.into()),
        }

        tracing::info!(worker = "pager", "Call confirmed");
        let hang_up_at = Instant::now() + self.settings.paging_duration;
        loop {
            let remaining = hang_up_at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match console.expect(&[DISCONNECTED], wait.min(remaining)).await? {
                ExpectOutcome::Matched(_) => break,
                ExpectOutcome::Timeout => continue,
                ExpectOutcome::Eof => return Err(ConsoleError::Exited.into()),
            }
        }

        tracing::info!(worker = "pager", "Hanging up");
        console.send_line("h").await?;
        console.expect_one(PROMPT, wait).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};

    use super::*;

    fn settings() -> PagerSettings {
        PagerSettings {
            paging_sip: "sip:7000@127.0.0.1:5065".to_string(),
            paging_duration: Duration::from_secs(100),
            throttle: Duration::from_secs(15),
            drain_every: None,
            registration_timeout: Duration::from_secs(10),
            expect_timeout: Duration::from_secs(10),
        }
    }

    /// Hands out consoles backed by in-memory pipes; the far ends go to the
    /// test through a channel.
    struct FakeLauncher {
        launches: Arc<AtomicUsize>,
        consoles: mpsc::UnboundedSender<DuplexStream>,
    }

    impl ConsoleLauncher for FakeLauncher {
        fn launch(&mut self) -> Result<ExpectSession, ConsoleError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            let (ours, theirs) = duplex(1024);
            let (reader, writer) = tokio::io::split(ours);
            self.consoles
                .send(theirs)
                .map_err(|_| ConsoleError::Exited)?;
            Ok(ExpectSession::new(reader, writer))
        }
    }

    fn fake_launcher() -> (
        FakeLauncher,
        Arc<AtomicUsize>,
        mpsc::UnboundedReceiver<DuplexStream>,
    ) {
        let launches = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let launcher = FakeLauncher {
            launches: launches.clone(),
            consoles: tx,
        };
        (launcher, launches, rx)
    }

    /// Scripted pjsua: answers each command line and counts calls.
    async fn pjsua(console: DuplexStream, calls: Arc<AtomicUsize>) {
        let (reader, mut writer) = tokio::io::split(console);
        let mut lines = BufReader::new(reader).lines();
        writer.write_all(b"registration success\n>>> ").await.unwrap();
        while let Ok(Some(line)) = lines.next_line().await {
            let reply: &[u8] = match line.as_str() {
                "h" | "echo ping" => b">>> ",
                "m" => b"Make call: ",
                _ if line.starts_with("sip:") => {
                    calls.fetch_add(1, Ordering::SeqCst);
                    b"Call 0 state changed to CONFIRMED\nCall 0 is DISCONNECTED\n"
                }
                _ => b"",
            };
            if writer.write_all(reply).await.is_err() {
                return;
            }
        }
    }

    #[test]
    fn test_throttle_admits_first_and_rejects_within_window() {
        // テスト項目: スロットル時間内の 2 回目の要求は拒否され、時間経過後は受理される
        // given (前提条件):
        let mut throttle = PageThrottle::new(Duration::from_secs(15));
        let t0 = Instant::now();

        // when (操作):
        let first = throttle.admit(t0, t0);
        let second = throttle.admit(t0 + Duration::from_secs(2), t0 + Duration::from_secs(2));
        let third = throttle.admit(t0 + Duration::from_secs(16), t0 + Duration::from_secs(16));

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        assert!(third);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_is_retried_until_success() {
        // テスト項目: 登録成功が表示されない場合は新しいコンソールで再試行し続ける
        // given (前提条件):
        let (launcher, launches, mut consoles) = fake_launcher();
        let (_page_tx, page_rx) = mpsc::channel(4);
        let (_status_tx, status_rx) = watch::channel(ActuationStatus::default());
        let mut supervisor = PageSupervisor::new(Box::new(launcher), settings(), page_rx, status_rx);
        let silent = tokio::spawn(async move {
            // first two consoles stay silent, the third registers
            let mut kept = Vec::new();
            for _ in 0..2 {
                kept.push(consoles.recv().await.unwrap());
            }
            let mut third = consoles.recv().await.unwrap();
            third.write_all(b"registration success\n").await.unwrap();
            kept.push(third);
            kept
        });

        // when (操作):
        let registered = supervisor.register().await;

        // then (期待する結果):
        assert!(registered.is_ok());
        assert_eq!(launches.load(Ordering::SeqCst), 3);
        drop(silent.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_console_exit_during_registration_is_fatal() {
        // テスト項目: 登録中にコンソールが終了した場合は致命的なエラーになる
        // given (前提条件):
        let (launcher, _launches, mut consoles) = fake_launcher();
        let (_page_tx, page_rx) = mpsc::channel(4);
        let (_status_tx, status_rx) = watch::channel(ActuationStatus::default());
        let mut supervisor = PageSupervisor::new(Box::new(launcher), settings(), page_rx, status_rx);
        tokio::spawn(async move {
            drop(consoles.recv().await);
        });

        // when (操作):
        let result = supervisor.register().await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(WorkerError::Console(ConsoleError::Exited))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_page_within_throttle_is_not_dialed() {
        // テスト項目: 2 秒間隔の 2 回のページ要求のうち、発信するのは 1 回目だけ
        // given (前提条件):
        let (launcher, _launches, mut consoles) = fake_launcher();
        let (page_tx, page_rx) = mpsc::channel(4);
        let (_status_tx, status_rx) = watch::channel(ActuationStatus::default());
        let supervisor = PageSupervisor::new(Box::new(launcher), settings(), page_rx, status_rx);
        let calls = Arc::new(AtomicUsize::new(0));
        let console_calls = calls.clone();
        tokio::spawn(async move {
            let console = consoles.recv().await.unwrap();
            pjsua(console, console_calls).await;
        });
        tokio::spawn(supervisor.run());

        // when (操作):
        page_tx
            .send(PageRequest {
                requested_at: Instant::now(),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        page_tx
            .send(PageRequest {
                requested_at: Instant::now(),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        // then (期待する結果):
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_waits_for_unlock_cycle() {
        // テスト項目: 解錠中のページ要求は停止期間が終わるまで発信されない
        // given (前提条件):
        let (launcher, _launches, mut consoles) = fake_launcher();
        let (page_tx, page_rx) = mpsc::channel(4);
        let (status_tx, status_rx) = watch::channel(ActuationStatus {
            paging_suspended_until: Some(Instant::now() + Duration::from_secs(12)),
        });
        let supervisor = PageSupervisor::new(Box::new(launcher), settings(), page_rx, status_rx);
        let calls = Arc::new(AtomicUsize::new(0));
        let console_calls = calls.clone();
        tokio::spawn(async move {
            let console = consoles.recv().await.unwrap();
            pjsua(console, console_calls).await;
        });
        tokio::spawn(supervisor.run());

        // when (操作):
        page_tx
            .send(PageRequest {
                requested_at: Instant::now(),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        let during = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        let after = calls.load(Ordering::SeqCst);

        // then (期待する結果):
        assert_eq!(during, 0);
        assert_eq!(after, 1);
        drop(status_tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answered_drain_pings_keep_console_running() {
        // テスト項目: drain_every ごとにコンソールへ ping を送り、プロンプトが返れば動き続ける
        // given (前提条件):
        let (launcher, _launches, mut consoles) = fake_launcher();
        let (_page_tx, page_rx) = mpsc::channel(4);
        let (_status_tx, status_rx) = watch::channel(ActuationStatus::default());
        let settings = PagerSettings {
            drain_every: Some(Duration::from_secs(5)),
            ..settings()
        };
        let supervisor = PageSupervisor::new(Box::new(launcher), settings, page_rx, status_rx);
        let pings = Arc::new(AtomicUsize::new(0));
        let console_pings = pings.clone();
        tokio::spawn(async move {
            let console = consoles.recv().await.unwrap();
            let (reader, mut writer) = tokio::io::split(console);
            let mut lines = BufReader::new(reader).lines();
            writer.write_all(b"registration success\n>>> ").await.unwrap();
            while let Ok(Some(line)) = lines.next_line().await {
                if line == "echo ping" {
                    console_pings.fetch_add(1, Ordering::SeqCst);
                    writer.write_all(b"ping\n>>> ").await.unwrap();
                }
            }
        });

        // when (操作):
        let running = tokio::spawn(supervisor.run());
        tokio::time::sleep(Duration::from_secs(31)).await;

        // then (期待する結果):
        assert!(pings.load(Ordering::SeqCst) >= 5);
        assert!(!running.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_drain_ping_is_fatal() {
        // テスト項目: ping にプロンプトが返らなければスーパーバイザーはエラーで終了する
        // given (前提条件):
        let (launcher, _launches, mut consoles) = fake_launcher();
        let (_page_tx, page_rx) = mpsc::channel(4);
        let (_status_tx, status_rx) = watch::channel(ActuationStatus::default());
        let settings = PagerSettings {
            drain_every: Some(Duration::from_secs(5)),
            ..settings()
        };
        let supervisor = PageSupervisor::new(Box::new(launcher), settings, page_rx, status_rx);
        let hung = tokio::spawn(async move {
            let mut console = consoles.recv().await.unwrap();
            console.write_all(b"registration success\n").await.unwrap();
            // keep the pipe open without ever answering
            std::future::pending::<()>().await;
            drop(console);
        });

        // when (操作):
        let result = supervisor.run().await;

        // then (期待する結果):
        match result {
            Err(WorkerError::Console(ConsoleError::Unresponsive { pattern })) => {
                assert_eq!(pattern, PROMPT);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        hung.abort();
    }
}
