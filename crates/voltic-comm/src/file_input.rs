//! The file-backed byte-source communicator.

use std::any::Any;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use voltic_core::{Communicator, FileError};
use voltic_queue::{flushable_ring, BlockQueue, FlushConsumer, FlushProducer};

use crate::wake::WakeSignal;
use crate::FILE_BUF_SIZE;

/// Byte request: reply is the requested byte framed over the ack code.
const CMD_BYTE_REQUEST: u8 = 0b001;
/// Availability poll: reply is the ack code plus one availability bit.
const CMD_AVAILABILITY: u8 = 0b101;

/// State owned by the stepping thread.
struct SimSide {
    queue: FlushConsumer<u8>,
    /// Committed 3-bit command codes awaiting a reply.
    commands: BlockQueue<u8>,
    /// Until the first byte is served, polls report "available" so a file
    /// that loads late (or is empty) is not mistaken for instant EOF.
    suppress_ended: bool,
    transmit_chunk: u8,
    transmit_count: u8,
    receive_chunk: u16,
    receive_count: u8,
}

/// State owned by the UI thread.
struct IoSide {
    thread: Option<JoinHandle<()>>,
    path: Option<PathBuf>,
}

/// Shared with the reader thread.
struct Shared {
    signal: WakeSignal,
    /// The producer handle parks here whenever no reader thread owns it.
    /// Migration is sequenced by spawning/joining the thread.
    producer_slot: Mutex<Option<FlushProducer<u8>>>,
}

/// Byte-stream source endpoint.
///
/// Three threads interact with this type: the UI thread
/// ([`set_file`](Self::set_file)/[`clear_file`](Self::clear_file)), the
/// stepping thread (`receive`/`transmit`), and the reader thread this
/// endpoint owns, which fills the byte ring from the file and marks the
/// stream ended at EOF.
pub struct FileInputCommunicator {
    index: AtomicU32,
    shared: Arc<Shared>,
    sim: Mutex<SimSide>,
    io: Mutex<IoSide>,
}

impl FileInputCommunicator {
    /// A fresh endpoint with no file loaded.
    pub fn new() -> Self {
        let (producer, consumer) = flushable_ring::<u8>(FILE_BUF_SIZE);
        Self {
            index: AtomicU32::new(0),
            shared: Arc::new(Shared {
                signal: WakeSignal::new(),
                producer_slot: Mutex::new(Some(producer)),
            }),
            sim: Mutex::new(SimSide {
                queue: consumer,
                commands: BlockQueue::new(64),
                suppress_ended: true,
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

    /// Load `path` and start serving its bytes. Replaces any current file;
    /// bytes already buffered from it are flushed on the next byte request.
    ///
    /// Called from the UI thread only.
    pub fn set_file(&self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let mut io = self.io.lock().unwrap();
        io.path = Some(path.as_ref().to_path_buf());
        self.load_file(&mut io, Some(path.as_ref()))
    }

    /// Unload the current file. Called from the UI thread only.
    pub fn clear_file(&self) {
        let mut io = self.io.lock().unwrap();
        io.path = None;
        // Unloading cannot fail.
        let _ = self.load_file(&mut io, None);
    }

    /// The currently configured file path, if any.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.io.lock().unwrap().path.clone()
    }

    /// Stop the reader thread, mark the buffered remainder discardable,
    /// and (when `path` is given) open the new file and restart.
    fn load_file(&self, io: &mut IoSide, path: Option<&Path>) -> Result<(), FileError> {
        self.join_reader(io);

        let mut slot = self.shared.producer_slot.lock().unwrap();
        let mut producer = slot.take().expect("producer handle parked while no thread runs");
        producer.flush();

        let file = match path {
            Some(path) => match File::open(path) {
                Ok(file) => Some(file),
                Err(source) => {
                    *slot = Some(producer);
                    return Err(FileError::Open {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            },
            None => None,
        };

        match file {
            Some(file) => {
                drop(slot);
                self.spawn_reader(io, file, producer);
            }
            None => *slot = Some(producer),
        }
        Ok(())
    }

    fn spawn_reader(&self, io: &mut IoSide, file: File, producer: FlushProducer<u8>) {
        self.shared.signal.reset();
        let shared = Arc::clone(&self.shared);
        io.thread = Some(
            thread::Builder::new()
                .name("voltic-file-in".into())
                .spawn(move || read_loop(shared, file, producer))
                .expect("failed to spawn file reader thread"),
        );
    }

    fn join_reader(&self, io: &mut IoSide) {
        if let Some(handle) = io.thread.take() {
            self.shared.signal.request_stop();
            let _ = handle.join();
        }
    }

    fn notify_reader(&self) {
        self.shared.signal.notify();
    }
}

impl Default for FileInputCommunicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for FileInputCommunicator {
    fn receive(&self) -> bool {
        let mut sim = self.sim.lock().unwrap();
        let sim = &mut *sim;
        if sim.receive_count == 0 {
            if let Some(&command) = sim.commands.front() {
                match command {
                    CMD_BYTE_REQUEST => {
                        if !sim.suppress_ended {
                            sim.queue.discard();
                        }
                        if let Some(byte) = sim.queue.peek() {
                            let producer_needs_signal =
                                sim.queue.pop_and_test_producer_needs_signal();
                            sim.receive_chunk = (u16::from(byte) << 3) | u16::from(CMD_BYTE_REQUEST);
                            sim.receive_count = 11;
                            sim.commands.pop();
                            sim.suppress_ended = false;
                            if producer_needs_signal {
                                self.notify_reader();
                            }
                        }
                        // No byte buffered yet: the command stays pending.
                    }
                    CMD_AVAILABILITY => {
                        if !sim.suppress_ended && (sim.queue.discard() || sim.queue.ended()) {
                            sim.receive_chunk = 0b0101;
                            sim.receive_count = 4;
                            sim.commands.pop();
                            sim.suppress_ended = true;
                        } else if sim.suppress_ended
                            || (!sim.queue.ended() && sim.queue.peek().is_some())
                        {
                            sim.receive_chunk = 0b1101;
                            sim.receive_count = 4;
                            sim.commands.pop();
                            sim.suppress_ended = true;
                        }
                        // Neither branch: no byte and no EOF yet, retry later.
                    }
                    _ => {
                        // Unrecognized command: drop it and carry on.
                        sim.commands.pop();
                    }
                }
            }
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
        sim.transmit_chunk |= (value as u8) << sim.transmit_count;
        // Leading zero bits are idle line, not a frame.
        if sim.transmit_chunk != 0 {
            sim.transmit_count += 1;
            if sim.transmit_count >= 3 {
                sim.commands.push(sim.transmit_chunk);
                sim.transmit_chunk = 0;
                sim.transmit_count = 0;
            }
        }
    }

    fn reset(&self) {
        let mut io = self.io.lock().unwrap();
        self.join_reader(&mut io);

        {
            let mut sim = self.sim.lock().unwrap();
            while sim.commands.pop().is_some() {}
            sim.suppress_ended = true;
            sim.transmit_chunk = 0;
            sim.transmit_count = 0;
            sim.receive_chunk = 0;
            sim.receive_count = 0;
            sim.queue.clear();
        }

        let path = io.path.clone();
        if let Some(path) = path {
            if let Ok(file) = File::open(&path) {
                let producer = self
                    .shared
                    .producer_slot
                    .lock()
                    .unwrap()
                    .take()
                    .expect("producer handle parked while no thread runs");
                self.spawn_reader(&mut io, file, producer);
            }
        }
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

impl Drop for FileInputCommunicator {
    fn drop(&mut self) {
        let mut io = self.io.lock().unwrap();
        self.join_reader(&mut io);
    }
}

/// Reader thread body: keep the ring full until EOF or a read error, then
/// mark the stream ended and park the producer handle for the next load.
fn read_loop(shared: Arc<Shared>, mut file: File, mut producer: FlushProducer<u8>) {
    let mut scratch = vec![0u8; FILE_BUF_SIZE];
    let mut stream_done = false;
    while !shared.signal.is_stopping() && !stream_done {
        loop {
            if shared.signal.is_stopping() {
                break;
            }
            let space = producer.space();
            if space == 0 {
                break;
            }
            let want = space.min(scratch.len());
            match file.read(&mut scratch[..want]) {
                Ok(0) => {
                    stream_done = true;
                    break;
                }
                Ok(count) => producer.push_slice(&scratch[..count]),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(_) => {
                    // Stream went bad: treat as end of file.
                    stream_done = true;
                    break;
                }
            }
        }
        if !shared.signal.is_stopping() && !stream_done {
            // Ring full: sleep until the consumer frees space.
            shared.signal.sleep_until(|| producer.space() > 0);
        }
    }
    producer.end();
    *shared.producer_slot.lock().unwrap() = Some(producer);
}
