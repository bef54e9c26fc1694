/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! In-memory transport implementation.
//!
//! Backs the [`LibraryTransport`] seam with bounded in-process queues, one
//! stream pair per named channel. Used by the test suites and by
//! single-process deployments where library and engine share an address
//! space. Redelivery-after-abort and publication back-pressure behave exactly
//! as the real log-structured transport.

use crate::messages::LibraryMessage;
use crate::{
    Action, FragmentHandler, LibraryTransport, PublishError, Publication, SharedPublication,
    Subscription,
};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

type SharedStream = Rc<RefCell<StreamState>>;

#[derive(Debug)]
struct StreamState {
    queue: VecDeque<LibraryMessage>,
    position: u64,
    capacity: usize,
}

impl StreamState {
    fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            position: 0,
            capacity,
        }
    }

    fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }

    fn offer(&mut self, message: LibraryMessage) -> Result<u64, PublishError> {
        if self.is_full() {
            return Err(PublishError::BackPressured);
        }
        self.queue.push_back(message);
        self.position += 1;
        Ok(self.position)
    }
}

struct MemorySubscription {
    state: SharedStream,
}

impl Subscription for MemorySubscription {
    fn controlled_poll(
        &mut self,
        handler: &mut dyn FragmentHandler,
        fragment_limit: usize,
    ) -> usize {
        let mut consumed = 0;
        while consumed < fragment_limit {
            // The fragment stays at the head until the handler consumes it,
            // so an Abort answer leads to redelivery on the next poll.
            let front = match self.state.borrow().queue.front() {
                Some(message) => message.clone(),
                None => break,
            };
            match handler.on_fragment(&front) {
                Action::Continue => {
                    self.state.borrow_mut().queue.pop_front();
                    consumed += 1;
                }
                Action::Abort => break,
            }
        }
        consumed
    }
}

struct MemoryPublication {
    state: SharedStream,
}

impl Publication for MemoryPublication {
    fn try_publish(&mut self, message: LibraryMessage) -> Result<u64, PublishError> {
        self.state.borrow_mut().offer(message)
    }

    fn position(&self) -> u64 {
        self.state.borrow().position
    }
}

#[derive(Clone)]
struct ChannelStreams {
    inbound: SharedStream,
    outbound: SharedStream,
}

/// In-memory [`LibraryTransport`] with one stream pair per channel name.
pub struct MemoryTransport {
    channels: HashMap<String, ChannelStreams>,
    current: Option<String>,
    reconnect: bool,
    capacity: usize,
}

impl MemoryTransport {
    /// Creates a transport whose streams buffer up to `capacity` fragments.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: HashMap::new(),
            current: None,
            reconnect: false,
            capacity,
        }
    }

    fn channel(&mut self, name: &str) -> ChannelStreams {
        let capacity = self.capacity;
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| ChannelStreams {
                inbound: Rc::new(RefCell::new(StreamState::new(capacity))),
                outbound: Rc::new(RefCell::new(StreamState::new(capacity))),
            })
            .clone()
    }

    fn current_channel(&mut self) -> ChannelStreams {
        let name = self
            .current
            .clone()
            .expect("init_streams must be called before using the transport");
        self.channel(&name)
    }

    /// Returns the engine's view of `channel`: publish inbound fragments to
    /// the library, observe what the library published outbound.
    #[must_use]
    pub fn engine_handle(&mut self, channel: &str) -> EngineHandle {
        let streams = self.channel(channel);
        EngineHandle {
            inbound: streams.inbound,
            outbound: streams.outbound,
        }
    }

    /// Creates a cross-thread feeder for `channel`.
    ///
    /// The returned sender may live on any thread; the [`InboundFeeder`] is
    /// pumped on the poller thread to move received fragments into the
    /// inbound stream without the library ever seeing the channel.
    #[must_use]
    pub fn feeder(
        &mut self,
        channel: &str,
    ) -> (crossbeam_channel::Sender<LibraryMessage>, InboundFeeder) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let streams = self.channel(channel);
        (
            tx,
            InboundFeeder {
                rx,
                inbound: streams.inbound,
            },
        )
    }
}

impl LibraryTransport for MemoryTransport {
    fn init_streams(&mut self, channel: &str) {
        tracing::debug!(channel, "binding in-memory streams");
        self.channel(channel);
        self.current = Some(channel.to_string());
        self.reconnect = true;
    }

    fn is_reconnect(&self) -> bool {
        self.reconnect
    }

    fn inbound_subscription(&mut self) -> Box<dyn Subscription> {
        let streams = self.current_channel();
        Box::new(MemorySubscription {
            state: streams.inbound,
        })
    }

    fn outbound_publication(&mut self) -> SharedPublication {
        let streams = self.current_channel();
        Rc::new(RefCell::new(MemoryPublication {
            state: streams.outbound,
        }))
    }
}

/// Engine-side endpoint of a [`MemoryTransport`] channel.
pub struct EngineHandle {
    inbound: SharedStream,
    outbound: SharedStream,
}

impl EngineHandle {
    /// Publishes one fragment toward the library.
    pub fn publish(&self, message: LibraryMessage) -> Result<u64, PublishError> {
        self.inbound.borrow_mut().offer(message)
    }

    /// Removes and returns everything the library has published.
    #[must_use]
    pub fn drain_outbound(&self) -> Vec<LibraryMessage> {
        self.outbound.borrow_mut().queue.drain(..).collect()
    }

    /// Returns the number of fragments awaiting delivery to the library.
    #[must_use]
    pub fn pending_inbound(&self) -> usize {
        self.inbound.borrow().queue.len()
    }
}

/// Poller-thread pump moving cross-thread fragments into the inbound stream.
pub struct InboundFeeder {
    rx: crossbeam_channel::Receiver<LibraryMessage>,
    inbound: SharedStream,
}

impl InboundFeeder {
    /// Moves every currently received fragment into the inbound stream.
    ///
    /// # Returns
    /// The number of fragments moved. Fragments that do not fit remain on
    /// the channel for the next pump.
    pub fn pump(&self) -> usize {
        let mut moved = 0;
        loop {
            // Capacity is checked before receiving so a fragment is never
            // pulled off the channel without a slot to land in.
            if self.inbound.borrow().is_full() {
                break;
            }
            match self.rx.try_recv() {
                Ok(message) => {
                    if self.inbound.borrow_mut().offer(message).is_ok() {
                        moved += 1;
                    }
                }
                Err(_) => break,
            }
        }
        moved
    }
}
