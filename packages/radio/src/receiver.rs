//! Door side of the radio link.
//!
//! Unlocks when the authorized sender transmits the unlock payload, relocks
//! after a fixed time and reports the relock back to that sender. While the
//! door is locked a status LED flashes briefly every few seconds.

use std::time::Duration;

use doorbridge_shared::gpio::OutputPin;
use tokio::time::Instant;

use crate::{
    codec::ReceivedMessage,
    command::{AtCommand, CommandQueue, RELOCKED_PAYLOAD, UNLOCK_PAYLOAD},
    engine::LineHandler,
    error::ProtocolError,
};

pub const BLINK_INTERVAL: Duration = Duration::from_secs(10);
pub const BLINK_LENGTH: Duration = Duration::from_millis(200);

pub struct DoorReceiver<P> {
    authorized_sender: u16,
    unlocked_duration: Duration,
    unlock_pin: P,
    led: Option<P>,
    unlocked_at: Option<Instant>,
    last_blink: Option<Instant>,
    blink_off_at: Option<Instant>,
}

impl<P: OutputPin> DoorReceiver<P> {
    pub fn new(
        authorized_sender: u16,
        unlocked_duration: Duration,
        unlock_pin: P,
        led: Option<P>,
    ) -> Self {
        Self {
            authorized_sender,
            unlocked_duration,
            unlock_pin,
            led,
            unlocked_at: None,
            last_blink: None,
            blink_off_at: None,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }

    fn set_led(&mut self, on: bool) -> Result<(), ProtocolError> {
        if let Some(led) = self.led.as_mut() {
            if on {
                led.set_high()?;
            } else {
                led.set_low()?;
            }
        }
        Ok(())
    }

    fn unlock(&mut self) -> Result<(), ProtocolError> {
        tracing::info!("Unlocking door");
        // a repeated unlock restarts the timer
        self.unlocked_at = Some(Instant::now());
        self.blink_off_at = None;
        self.unlock_pin.set_high()?;
        self.set_led(true)
    }

    fn relock(&mut self, commands: &mut CommandQueue) -> Result<(), ProtocolError> {
        tracing::info!("Relocking door");
        self.unlock_pin.set_low()?;
        self.set_led(false)?;
        self.unlocked_at = None;
        commands.push(AtCommand::send(self.authorized_sender, RELOCKED_PAYLOAD));
        Ok(())
    }
}

impl<P: OutputPin> LineHandler for DoorReceiver<P> {
    fn handle_message(
        &mut self,
        message: &ReceivedMessage,
        _commands: &mut CommandQueue,
    ) -> Result<(), ProtocolError> {
        tracing::info!("Received {:?} from {}", message.payload, message.address);
        if message.payload == UNLOCK_PAYLOAD && message.address == self.authorized_sender {
            self.unlock()?;
        } else if message.payload == UNLOCK_PAYLOAD {
            tracing::warn!("Ignoring unlock from unauthorized sender {}", message.address);
        }
        Ok(())
    }

    fn manage_state(&mut self, commands: &mut CommandQueue) -> Result<(), ProtocolError> {
        let now = Instant::now();

        if let Some(unlocked_at) = self.unlocked_at {
            if now >= unlocked_at + self.unlocked_duration {
                self.relock(commands)?;
            }
            return Ok(());
        }

        if let Some(off_at) = self.blink_off_at
            && now >= off_at
        {
            self.set_led(false)?;
            self.blink_off_at = None;
        }
        let due = self
            .last_blink
            .is_none_or(|last| now >= last + BLINK_INTERVAL);
        if due {
            self.set_led(true)?;
            self.last_blink = Some(now);
            self.blink_off_at = Some(now + BLINK_LENGTH);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use doorbridge_shared::gpio::MemoryPin;

    use super::*;

    fn unlock_from(address: u16) -> ReceivedMessage {
        ReceivedMessage {
            address,
            payload: UNLOCK_PAYLOAD.to_string(),
            rssi: -40,
            snr: 9,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_then_relock_after_duration() {
        // テスト項目: 許可された送信元の 80F で解錠し、所定時間後に再施錠して 79F を返す
        // given (前提条件):
        let pin = MemoryPin::new();
        let mut receiver = DoorReceiver::new(2, Duration::from_secs(5), pin.clone(), None);
        let mut commands = CommandQueue::new();

        // when (操作):
        receiver.handle_message(&unlock_from(2), &mut commands).unwrap();
        tokio::time::advance(Duration::from_millis(4_900)).await;
        receiver.manage_state(&mut commands).unwrap();
        let still_open = pin.is_high();
        tokio::time::advance(Duration::from_millis(100)).await;
        receiver.manage_state(&mut commands).unwrap();

        // then (期待する結果):
        assert!(still_open);
        assert!(!pin.is_high());
        assert!(!receiver.is_unlocked());
        assert_eq!(commands.pop(), Some(AtCommand::send(2, "79F")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_sender_is_ignored() {
        // テスト項目: 許可されていない送信元からの 80F では解錠しない
        // given (前提条件):
        let pin = MemoryPin::new();
        let mut receiver = DoorReceiver::new(2, Duration::from_secs(5), pin.clone(), None);

        // when (操作):
        receiver
            .handle_message(&unlock_from(7), &mut CommandQueue::new())
            .unwrap();

        // then (期待する結果):
        assert_eq!(pin.activations(), 0);
        assert!(!receiver.is_unlocked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_led_blinks_while_locked() {
        // テスト項目: 施錠中は 10 秒ごとに LED が短く点灯する
        // given (前提条件):
        let led = MemoryPin::new();
        let mut receiver =
            DoorReceiver::new(2, Duration::from_secs(5), MemoryPin::new(), Some(led.clone()));
        let mut commands = CommandQueue::new();

        // when (操作):
        receiver.manage_state(&mut commands).unwrap();
        let first_on = led.is_high();
        tokio::time::advance(Duration::from_millis(250)).await;
        receiver.manage_state(&mut commands).unwrap();
        let then_off = !led.is_high();
        tokio::time::advance(Duration::from_secs(10)).await;
        receiver.manage_state(&mut commands).unwrap();

        // then (期待する結果):
        assert!(first_on);
        assert!(then_off);
        assert_eq!(led.activations(), 2);
        assert!(commands.is_empty());
    }
}
