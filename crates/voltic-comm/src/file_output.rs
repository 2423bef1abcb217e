//! The file-backed byte-sink communicator.

use std::any::Any;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use voltic_core::{Communicator, FileError};
use voltic_queue::{spsc_ring, BlockQueue, Consumer, Producer};

use crate::wake::WakeSignal;
use crate::FILE_BUF_SIZE;

/// The only frame the sink understands: ack code `0b001` plus 8 data bits.
const FRAME_WRITE: u16 = 0b001;

/// State owned by the stepping thread.
struct SimSide {
    queue: Producer<u8>,
    /// Bytes that did not fit in the ring; drained back on every tick.
    overflow: BlockQueue<u8>,
    transmit_chunk: u16,
    transmit_count: u8,
    receive_chunk: u8,
    receive_count: u8,
}

/// State owned by the UI thread.
struct IoSide {
    thread: Option<JoinHandle<()>>,
    path: Option<PathBuf>,
}

/// Shared with the writer thread.
struct Shared {
    signal: WakeSignal,
    /// Bytes committed to the file, not yet acknowledged over the wire.
    acknowledged: AtomicUsize,
    /// The consumer handle parks here whenever no writer thread owns it.
    consumer_slot: Mutex<Option<Consumer<u8>>>,
}

/// Byte-stream sink endpoint.
///
/// The stepping thread shifts 11-bit write frames in via `transmit`; each
/// committed byte is acknowledged by the writer thread through an atomic
/// counter, and `receive` plays one 3-bit ack frame back per committed
/// byte. Writes bypass userspace buffering: bytes go straight from the ring
/// to the `File` handle.
pub struct FileOutputCommunicator {
    index: AtomicU32,
    shared: Arc<Shared>,
    sim: Mutex<SimSide>,
    io: Mutex<IoSide>,
}

impl FileOutputCommunicator {
    /// A fresh endpoint with no file loaded.
    pub fn new() -> Self {
        let (producer, consumer) = spsc_ring::<u8>(FILE_BUF_SIZE);
        Self {
            index: AtomicU32::new(0),
            shared: Arc::new(Shared {
                signal: WakeSignal::new(),
                acknowledged: AtomicUsize::new(0),
                consumer_slot: Mutex::new(Some(consumer)),
            }),
            sim: Mutex::new(SimSide {
                queue: producer,
                overflow: BlockQueue::new(FILE_BUF_SIZE),
                transmit_chunk: 0,
                transmit_count: 0,
                receive_chunk: 0,
                receive_count: 0,
            }),
            io: Mutex::new(IoSide {
                thread: None,
                path: None,
            }),
        }
    }

    /// Open `path` for writing (truncating it) and start the writer thread.
    ///
    /// Called from the UI thread only.
    pub fn set_file(&self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let mut io = self.io.lock().unwrap();
        io.path = Some(path.as_ref().to_path_buf());
        self.join_writer(&mut io);
        self.load_file(&mut io)
    }

    /// Unload the current file. Called from the UI thread only.
    pub fn clear_file(&self) {
        let mut io = self.io.lock().unwrap();
        io.path = None;
        self.join_writer(&mut io);
    }

    /// The currently configured file path, if any.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.io.lock().unwrap().path.clone()
    }

    fn load_file(&self, io: &mut IoSide) -> Result<(), FileError> {
        let Some(path) = io.path.clone() else {
            return Ok(());
        };
        let file = File::create(&path).map_err(|source| FileError::Open {
            path: path.clone(),
            source,
        })?;
        let consumer = self
            .shared
            .consumer_slot
            .lock()
            .unwrap()
            .take()
            .expect("consumer handle parked while no thread runs");
        self.shared.signal.reset();
        let shared = Arc::clone(&self.shared);
        io.thread = Some(
            thread::Builder::new()
                .name("voltic-file-out".into())
                .spawn(move || write_loop(shared, file, consumer))
                .expect("failed to spawn file writer thread"),
        );
        Ok(())
    }

    fn join_writer(&self, io: &mut IoSide) {
        if let Some(handle) = io.thread.take() {
            self.shared.signal.request_stop();
            let _ = handle.join();
        }
    }
}

impl Default for FileOutputCommunicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for FileOutputCommunicator {
    fn receive(&self) -> bool {
        let mut sim = self.sim.lock().unwrap();
        if sim.receive_count == 0 && self.shared.acknowledged.load(Ordering::Acquire) > 0 {
            self.shared.acknowledged.fetch_sub(1, Ordering::AcqRel);
            sim.receive_chunk = FRAME_WRITE as u8;
            sim.receive_count = 3;
        }
        if sim.receive_count != 0 {
            let out = sim.receive_chunk & 1 == 1;
            sim.receive_chunk >>= 1;
            sim.receive_count -= 1;
            return out;
        }
        false
    }

    fn transmit(&self, value: bool) {
        let mut sim = self.sim.lock().unwrap();
        let sim = &mut *sim;

        // First, move whatever overflow now fits into the ring.
        while let Some(&byte) = sim.overflow.front() {
            if sim.queue.try_push(byte).is_err() {
                break;
            }
            sim.overflow.pop();
        }

        sim.transmit_chunk |= (value as u16) << sim.transmit_count;
        // Leading zero bits are idle line, not a frame.
        if sim.transmit_chunk == 0 {
            return;
        }
        sim.transmit_count += 1;
        if sim.transmit_count < 3 {
            return;
        }
        match sim.transmit_chunk & 0b111 {
            FRAME_WRITE => {
                if sim.transmit_count == 11 {
                    let byte = (sim.transmit_chunk >> 3) as u8;
                    let mut consumer_needs_signal = false;
                    if sim.overflow.is_empty() && sim.queue.space() > 0 {
                        consumer_needs_signal =
                            sim.queue.push_and_test_consumer_needs_signal(byte);
                    } else {
                        sim.overflow.push(byte);
                    }
                    sim.transmit_chunk = 0;
                    sim.transmit_count = 0;
                    if consumer_needs_signal {
                        self.shared.signal.notify();
                    }
                }
            }
            _ => {
                // Unrecognized frame code: drop it.
                sim.transmit_chunk = 0;
                sim.transmit_count = 0;
            }
        }
    }

    fn reset(&self) {
        let mut io = self.io.lock().unwrap();
        self.join_writer(&mut io);

        {
            let mut sim = self.sim.lock().unwrap();
            while sim.overflow.pop().is_some() {}
            sim.transmit_chunk = 0;
            sim.transmit_count = 0;
            sim.receive_chunk = 0;
            sim.receive_count = 0;
        }
        if let Some(consumer) = self.shared.consumer_slot.lock().unwrap().as_mut() {
            consumer.clear();
        }
        self.shared.acknowledged.store(0, Ordering::Relaxed);

        // Reopen the configured path. Open failures leave the endpoint
        // unloaded, same as a failed set_file.
        let _ = self.load_file(&mut io);
    }

    fn set_index(&self, index: u32) {
        self.index.store(index, Ordering::Relaxed);
    }

    fn index(&self) -> u32 {
        self.index.load(Ordering::Relaxed)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for FileOutputCommunicator {
    fn drop(&mut self) {
        let mut io = self.io.lock().unwrap();
        self.join_writer(&mut io);
    }
}

/// Writer thread body: drain the ring into the file, acknowledging each
/// committed byte. A short write means the file is broken; the thread stops
/// itself and later bytes silently accumulate unsent.
fn write_loop(shared: Arc<Shared>, mut file: File, mut consumer: Consumer<u8>) {
    let mut scratch = vec![0u8; FILE_BUF_SIZE];
    while !shared.signal.is_stopping() {
        loop {
            if shared.signal.is_stopping() {
                break;
            }
            let available = consumer.available();
            if available == 0 {
                break;
            }
            let want = available.min(scratch.len());
            // Peek, write, then pop: a failed write must not lose bytes.
            consumer.peek_slice(&mut scratch[..want]);
            match file.write(&scratch[..want]) {
                Ok(written) => {
                    consumer.discard_front(written);
                    shared.acknowledged.fetch_add(written, Ordering::Release);
                    if written != want {
                        shared.signal.stop_from_within();
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(_) => shared.signal.stop_from_within(),
            }
        }
        if !shared.signal.is_stopping() {
            // Ring empty: sleep until the producer queues more bytes.
            shared.signal.sleep_until(|| consumer.available() > 0);
        }
    }
    *shared.consumer_slot.lock().unwrap() = Some(consumer);
}
