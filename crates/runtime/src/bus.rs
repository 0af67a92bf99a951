//! In-process relay between the two socket servers.
//!
//! A bus is created per bridge run and holds one lane per direction. Each lane
//! has exactly one subscriber (the server on the receiving side); publishing
//! never blocks, and a message published after its subscriber went away is
//! dropped.

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Which server a message is travelling to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
	/// Inspector text headed for the device socket.
	ToDevice,
	/// Unwrapped device results headed for the inspector socket.
	ToInspector,
}

#[derive(Debug)]
pub struct RelayBus {
	to_device: Lane,
	to_inspector: Lane,
}

#[derive(Debug)]
struct Lane {
	tx: mpsc::UnboundedSender<String>,
	rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl Lane {
	fn new() -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		Self {
			tx,
			rx: Mutex::new(Some(rx)),
		}
	}
}

/// Receiving end of one lane. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
	direction: Direction,
	rx: mpsc::UnboundedReceiver<String>,
}

impl Subscription {
	pub fn direction(&self) -> Direction {
		self.direction
	}

	/// Waits for the next message; `None` once the bus is gone.
	pub async fn recv(&mut self) -> Option<String> {
		self.rx.recv().await
	}
}

impl RelayBus {
	pub fn new() -> Self {
		Self {
			to_device: Lane::new(),
			to_inspector: Lane::new(),
		}
	}

	fn lane(&self, direction: Direction) -> &Lane {
		match direction {
			Direction::ToDevice => &self.to_device,
			Direction::ToInspector => &self.to_inspector,
		}
	}

	/// Queues a message for the subscriber of `direction`.
	///
	/// Returns false when that subscriber has already unsubscribed.
	pub fn publish(&self, direction: Direction, message: String) -> bool {
		self.lane(direction).tx.send(message).is_ok()
	}

	/// Takes the receiving end of a lane. Each lane can be subscribed once.
	pub fn subscribe(&self, direction: Direction) -> Option<Subscription> {
		self.lane(direction)
			.rx
			.lock()
			.take()
			.map(|rx| Subscription { direction, rx })
	}
}

impl Default for RelayBus {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn lanes_are_independent_and_ordered() {
		let bus = RelayBus::new();
		let mut device = bus.subscribe(Direction::ToDevice).unwrap();
		let mut inspector = bus.subscribe(Direction::ToInspector).unwrap();

		assert!(bus.publish(Direction::ToDevice, "a".into()));
		assert!(bus.publish(Direction::ToInspector, "x".into()));
		assert!(bus.publish(Direction::ToDevice, "b".into()));

		assert_eq!(device.recv().await.as_deref(), Some("a"));
		assert_eq!(device.recv().await.as_deref(), Some("b"));
		assert_eq!(inspector.recv().await.as_deref(), Some("x"));
		assert_eq!(device.direction(), Direction::ToDevice);
	}

	#[test]
	fn a_lane_has_a_single_subscriber() {
		let bus = RelayBus::new();
		assert!(bus.subscribe(Direction::ToInspector).is_some());
		assert!(bus.subscribe(Direction::ToInspector).is_none());
	}

	#[test]
	fn publishing_after_unsubscribe_is_dropped() {
		let bus = RelayBus::new();
		drop(bus.subscribe(Direction::ToDevice));
		assert!(!bus.publish(Direction::ToDevice, "lost".into()));
	}
}
