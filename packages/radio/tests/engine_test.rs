//! AT engine driven over an in-memory duplex stream standing in for the
//! serial port.

use std::time::Duration;

use doorbridge_radio::{
    AtCommand, CommandQueue, LineHandler, LineProtocolEngine, ProtocolError, RadioSettings,
    codec::ReceivedMessage, receiver::DoorReceiver,
};
use doorbridge_shared::gpio::MemoryPin;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};

/// Records every received message.
#[derive(Default)]
struct RecordingHandler {
    received: Vec<(u16, String)>,
}

impl LineHandler for RecordingHandler {
    fn handle_message(
        &mut self,
        message: &ReceivedMessage,
        _commands: &mut CommandQueue,
    ) -> Result<(), ProtocolError> {
        self.received.push((message.address, message.payload.clone()));
        Ok(())
    }
}

/// The module side of the link.
struct FakeModule {
    reader: BufReader<tokio::io::ReadHalf<DuplexStream>>,
    writer: tokio::io::WriteHalf<DuplexStream>,
}

impl FakeModule {
    fn new(stream: DuplexStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn expect_line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line
    }

    async fn write(&mut self, data: &str) {
        self.writer.write_all(data.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }
}

#[tokio::test]
async fn test_command_round_trip() {
    // テスト項目: AT+BAND に +OK が返るとコマンドが正常に完了する
    // given (前提条件):
    let (engine_side, module_side) = duplex(256);
    let mut engine = LineProtocolEngine::new(engine_side, RecordingHandler::default());
    let mut module = FakeModule::new(module_side);

    // when (操作):
    let command = AtCommand::band(915_000_000);
    let (result, written) = tokio::join!(engine.send_command(&command), async {
        let line = module.expect_line().await;
        module.write("+OK\r\n").await;
        line
    });

    // then (期待する結果):
    assert_eq!(written, "AT+BAND=915000000\r\n");
    assert_eq!(result.unwrap(), "+OK");
}

#[tokio::test]
async fn test_command_mismatch_is_reported() {
    // テスト項目: 期待と異なる応答はコマンド不一致エラーになる
    // given (前提条件):
    let (engine_side, module_side) = duplex(256);
    let mut engine = LineProtocolEngine::new(engine_side, RecordingHandler::default());
    let mut module = FakeModule::new(module_side);

    // when (操作):
    let command = AtCommand::band(915_000_000);
    let (result, _) = tokio::join!(engine.send_command(&command), async {
        module.expect_line().await;
        module.write("+ERR=4\r\n").await;
    });

    // then (期待する結果):
    match result {
        Err(ProtocolError::Mismatch { expected, got, .. }) => {
            assert_eq!(expected, "+OK");
            assert_eq!(got, "+ERR=4");
        }
        other => panic!("expected mismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_receive_notification_between_command_and_response() {
    // テスト項目: 応答待ちの間に届いた +RCV はハンドラに渡され、応答とはみなされない
    // given (前提条件):
    let (engine_side, module_side) = duplex(256);
    let mut engine = LineProtocolEngine::new(engine_side, RecordingHandler::default());
    let mut module = FakeModule::new(module_side);

    // when (操作):
    let command = AtCommand::network_id(18);
    let (result, _) = tokio::join!(engine.send_command(&command), async {
        module.expect_line().await;
        module.write("+RCV=50,5,HELLO,-99,40\r\n\r\n+O").await;
        module.write("K\r\n").await;
    });

    // then (期待する結果):
    assert_eq!(result.unwrap(), "+OK");
    assert_eq!(engine.handler().received, vec![(50, "HELLO".to_string())]);
}

#[tokio::test]
async fn test_receive_notification_while_idle() {
    // テスト項目: コマンドがないときの +RCV もハンドラに渡される
    // given (前提条件):
    let (engine_side, module_side) = duplex(256);
    let mut engine = LineProtocolEngine::new(engine_side, RecordingHandler::default())
        .with_poll_interval(Duration::from_millis(500));
    let mut module = FakeModule::new(module_side);
    module.write("+READY\r\n+RCV=1,3,79F,-20,12\r\n").await;

    // when (操作):
    engine.run_once().await.unwrap();

    // then (期待する結果):
    assert_eq!(engine.handler().received, vec![(1, "79F".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_missing_response_times_out() {
    // テスト項目: 5 秒以内に応答がなければタイムアウトエラーになる
    // given (前提条件):
    let (engine_side, _module_side) = duplex(256);
    let mut engine = LineProtocolEngine::new(engine_side, RecordingHandler::default());

    // when (操作):
    let result = engine.send_command(&AtCommand::attention()).await;

    // then (期待する結果):
    assert!(matches!(
        result,
        Err(ProtocolError::ResponseTimeout { timeout, .. }) if timeout == Duration::from_secs(5)
    ));
}

#[tokio::test]
async fn test_closed_stream_is_fatal() {
    // テスト項目: ストリームが閉じると Closed エラーで終了する
    // given (前提条件):
    let (engine_side, module_side) = duplex(256);
    let mut engine = LineProtocolEngine::new(engine_side, RecordingHandler::default());
    drop(module_side);

    // when (操作):
    let result = engine.run().await;

    // then (期待する結果):
    assert!(matches!(result, Err(ProtocolError::Closed)));
}

#[tokio::test]
async fn test_setup_sequence_runs_one_command_at_a_time() {
    // テスト項目: 初期化コマンドは 1 つずつ、応答を待ってから次が送られる
    // given (前提条件):
    let (engine_side, module_side) = duplex(256);
    let settings = RadioSettings::default();
    let mut engine = LineProtocolEngine::new(engine_side, RecordingHandler::default())
        .with_commands(settings.setup_commands());
    let mut module = FakeModule::new(module_side);

    // when (操作):
    let engine_task = async {
        for _ in 0..5 {
            engine.run_once().await.unwrap();
        }
        engine.queued()
    };
    let module_task = async {
        let mut seen = Vec::new();
        for response in ["+OK", "+OK", "+OK", "+IPR=115200", "+OK"] {
            seen.push(module.expect_line().await.trim_end().to_string());
            module.write(&format!("{response}\r\n")).await;
        }
        seen
    };
    let (remaining, seen) = tokio::join!(engine_task, module_task);

    // then (期待する結果):
    assert_eq!(remaining, 0);
    assert_eq!(
        seen,
        vec![
            "AT",
            "AT+BAND=915000000",
            "AT+NETWORKID=18",
            "AT+IPR=115200",
            "AT+ADDRESS=2",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_door_receiver_unlocks_and_reports_relock() {
    // テスト項目: 受信側は 80F で解錠し、所定時間後に 79F を送信元へ返す
    // given (前提条件):
    let (engine_side, module_side) = duplex(256);
    let pin = MemoryPin::new();
    let receiver = DoorReceiver::new(2, Duration::from_secs(5), pin.clone(), None);
    let mut engine = LineProtocolEngine::new(engine_side, receiver);
    let mut module = FakeModule::new(module_side);
    let engine_task = tokio::spawn(async move { engine.run().await });

    // when (操作):
    module.write("+RCV=2,3,80F,-30,10\r\n").await;
    let reply = module.expect_line().await;
    let opened = pin.activations();
    let closed = !pin.is_high();
    module.write("+OK\r\n").await;

    // then (期待する結果):
    assert_eq!(reply, "AT+SEND=2,3,79F\r\n");
    assert_eq!(opened, 1);
    assert!(closed);
    engine_task.abort();
}
