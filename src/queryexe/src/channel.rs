//! Single-slot channels connecting an operator's output to its consumer.
//!
//! A channel holds at most one row. A producer that gets ahead blocks in
//! [`Sink::send`] until the consumer takes the row, so back-pressure travels
//! one hop at a time without any flow-control messages. The end of a stream
//! is the shared sentinel row sent by [`Sink::end`].
//!
//! Every blocking call also watches the query's [`CancelHandle`] and gives up
//! with [`FlowError::Cancelled`] once it fires.

use common::{FlowError, Row};
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

/// Number of rows a channel buffers.
pub const CHANNEL_CAPACITY: usize = 1;

/// Query-wide cancellation signal shared by every channel of one graph.
///
/// Cancelling drops the only sender of an internal channel, which wakes every
/// blocked `select!` watching the receiving side.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(trigger))),
            signal,
        }
    }

    /// Aborts every blocked and future channel operation. Idempotent.
    pub fn cancel(&self) {
        let mut trigger = self.trigger.lock().unwrap();
        if trigger.take().is_some() {
            warn!("query cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// Creates a connected Sink/Source pair watching `cancel`.
pub fn channel(cancel: &CancelHandle) -> (Sink, Source) {
    let (tx, rx) = bounded(CHANNEL_CAPACITY);
    let sink = Sink {
        tx,
        cancel: cancel.clone(),
    };
    let source = Source {
        rx,
        cancel: cancel.clone(),
        finished: false,
    };
    (sink, source)
}

/// Producer half of a channel.
#[derive(Debug)]
pub struct Sink {
    tx: Sender<Row>,
    cancel: CancelHandle,
}

impl Sink {
    /// Hands `row` to the consumer, blocking while the slot is occupied.
    ///
    /// On cancellation the row is dropped undelivered.
    ///
    /// # Panics
    ///
    /// Panics if `row` is the end-of-stream sentinel; use [`Sink::end`].
    pub fn send(&self, row: Row) -> Result<(), FlowError> {
        assert!(
            !row.is_end_of_stream(),
            "the end-of-stream sentinel can only be sent by Sink::end"
        );
        self.push(row)
    }

    /// Closes the stream by sending the sentinel.
    pub fn end(self) -> Result<(), FlowError> {
        self.push(Row::end_of_stream())
    }

    fn push(&self, row: Row) -> Result<(), FlowError> {
        if self.cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        select! {
            send(self.tx, row) -> res => res.map_err(|_| {
                FlowError::ExecutionError(String::from("Consumer closed its input"))
            }),
            recv(self.cancel.signal) -> _ => Err(FlowError::Cancelled),
        }
    }
}

/// Consumer half of a channel.
#[derive(Debug)]
pub struct Source {
    rx: Receiver<Row>,
    cancel: CancelHandle,
    /// Set once the sentinel has been received.
    finished: bool,
}

impl Source {
    /// Takes the next row, blocking until one is available.
    ///
    /// After the sentinel has been returned once, every further call returns
    /// the sentinel again without blocking.
    pub fn receive(&mut self) -> Result<Row, FlowError> {
        if self.finished {
            return Ok(Row::end_of_stream());
        }
        if self.cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        let row = select! {
            recv(self.rx) -> msg => msg.map_err(|_| {
                FlowError::ExecutionError(String::from("Producer stopped without ending its output"))
            })?,
            recv(self.cancel.signal) -> _ => return Err(FlowError::Cancelled),
        };
        if row.is_end_of_stream() {
            self.finished = true;
        }
        Ok(row)
    }

    /// True once the sentinel has been received.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Iterates over the data rows, stopping at the sentinel.
    pub fn rows(&mut self) -> Rows<'_> {
        Rows { source: self }
    }
}

/// Iterator returned by [`Source::rows`].
pub struct Rows<'a> {
    source: &'a mut Source,
}

impl<'a> Iterator for Rows<'a> {
    type Item = Result<Row, FlowError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.source.receive() {
            Ok(row) if row.is_end_of_stream() => None,
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::testutil::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    const SETTLE: Duration = Duration::from_millis(100);

    #[test]
    fn test_fifo_then_sentinel() {
        let cancel = CancelHandle::new();
        let (sink, mut source) = channel(&cancel);
        let rows = create_row_list(vec![vec![1], vec![2], vec![3]]);
        let expected = rows.clone();
        let producer = thread::spawn(move || {
            for row in rows {
                sink.send(row)?;
            }
            sink.end()
        });
        let received: Result<Vec<Row>, FlowError> = source.rows().collect();
        assert_eq!(received.unwrap(), expected);
        assert!(source.is_finished());
        producer.join().unwrap().unwrap();
    }

    #[test]
    fn test_receive_after_end_is_idempotent() {
        let cancel = CancelHandle::new();
        let (sink, mut source) = channel(&cancel);
        sink.end().unwrap();
        assert!(source.receive().unwrap().is_end_of_stream());
        assert!(source.receive().unwrap().is_end_of_stream());
        assert!(source.receive().unwrap().is_end_of_stream());
        // Still defined after cancellation.
        cancel.cancel();
        assert!(source.receive().unwrap().is_end_of_stream());
    }

    #[test]
    fn test_second_send_blocks_until_drained() {
        init();
        let cancel = CancelHandle::new();
        let (sink, mut source) = channel(&cancel);
        let sent = Arc::new(AtomicUsize::new(0));
        let progress = Arc::clone(&sent);
        let producer = thread::spawn(move || {
            for i in 0..2 {
                sink.send(int_vec_to_row(vec![i])).unwrap();
                progress.fetch_add(1, Ordering::SeqCst);
            }
            sink.end().unwrap();
        });

        thread::sleep(SETTLE);
        assert_eq!(sent.load(Ordering::SeqCst), 1);

        assert_eq!(source.receive().unwrap(), int_vec_to_row(vec![0]));
        assert_eq!(source.receive().unwrap(), int_vec_to_row(vec![1]));
        assert!(source.receive().unwrap().is_end_of_stream());
        producer.join().unwrap();
        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancel_unblocks_send() {
        let cancel = CancelHandle::new();
        let (sink, source) = channel(&cancel);
        sink.send(int_vec_to_row(vec![1])).unwrap();
        let producer = thread::spawn(move || sink.send(int_vec_to_row(vec![2])));
        thread::sleep(SETTLE);
        cancel.cancel();
        assert_eq!(producer.join().unwrap(), Err(FlowError::Cancelled));

        // Only the first row ever reached the queue.
        assert_eq!(source.rx.try_recv().unwrap(), int_vec_to_row(vec![1]));
        assert!(source.rx.try_recv().is_err());
    }

    #[test]
    fn test_cancel_unblocks_receive() {
        let cancel = CancelHandle::new();
        let (_sink, mut source) = channel(&cancel);
        let consumer = thread::spawn(move || source.receive());
        thread::sleep(SETTLE);
        cancel.cancel();
        assert_eq!(consumer.join().unwrap(), Err(FlowError::Cancelled));
    }

    #[test]
    fn test_cancelled_before_call() {
        let cancel = CancelHandle::new();
        let (sink, mut source) = channel(&cancel);
        cancel.cancel();
        cancel.cancel();
        assert!(cancel.is_cancelled());
        assert_eq!(sink.send(int_vec_to_row(vec![1])), Err(FlowError::Cancelled));
        assert_eq!(source.receive(), Err(FlowError::Cancelled));
    }

    #[test]
    fn test_dropped_sink_is_an_error() {
        let cancel = CancelHandle::new();
        let (sink, mut source) = channel(&cancel);
        sink.send(int_vec_to_row(vec![1])).unwrap();
        drop(sink);
        assert_eq!(source.receive().unwrap(), int_vec_to_row(vec![1]));
        assert!(matches!(
            source.receive(),
            Err(FlowError::ExecutionError(_))
        ));
    }

    #[test]
    fn test_dropped_source_is_an_error() {
        let cancel = CancelHandle::new();
        let (sink, source) = channel(&cancel);
        drop(source);
        assert!(matches!(
            sink.send(int_vec_to_row(vec![1])),
            Err(FlowError::ExecutionError(_))
        ));
    }

    #[test]
    #[should_panic(expected = "sentinel")]
    fn test_send_rejects_sentinel() {
        let cancel = CancelHandle::new();
        let (sink, _source) = channel(&cancel);
        let _ = sink.send(Row::end_of_stream());
    }

    #[test]
    fn test_many_rows_across_threads() {
        let cancel = CancelHandle::new();
        let (sink, mut source) = channel(&cancel);
        let count = 1000;
        let producer = thread::spawn(move || {
            for i in 0..count {
                sink.send(int_vec_to_row(vec![i])).unwrap();
            }
            sink.end().unwrap();
        });
        let mut expected = 0;
        for row in source.rows() {
            assert_eq!(row.unwrap().get_field(0).unwrap().unwrap_int(), expected);
            expected += 1;
        }
        assert_eq!(expected, count);
        producer.join().unwrap();
    }
}
