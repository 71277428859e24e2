//! 读取器端到端测试

use super::*;
use crate::config::{ReadMode, TerminatorPolicy};
use std::sync::atomic::{AtomicBool, AtomicUsize};
use tempfile::{TempDir, tempdir};

fn input(data: &[u8]) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("input.txt");
    std::fs::write(&path, data).unwrap();
    (dir, path)
}

fn run<L: SliceListener>(data: &[u8], config: Config, listener: &L) -> Result<Summary> {
    let (_dir, path) = input(data);
    LineReader::new(&path, config)?.execute(listener)
}

/// Records every callback
#[derive(Default)]
struct Recorder {
    started: AtomicBool,
    slices: Mutex<Vec<Slice>>,
    delivered_at_end: Mutex<Option<usize>>,
}

impl Recorder {
    fn sorted(&self) -> Vec<Slice> {
        let mut slices = self.slices.lock().clone();
        slices.sort_by_key(Slice::start);
        slices
    }
}

impl SliceListener for Recorder {
    fn on_start(&self, _input_len: NonZeroU64) -> io::Result<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn on_slice(&self, slice: Slice) -> io::Result<()> {
        self.slices.lock().push(slice);
        Ok(())
    }

    fn on_end(&self, _summary: &Summary) -> io::Result<()> {
        *self.delivered_at_end.lock() = Some(self.slices.lock().len());
        Ok(())
    }
}

mod execute_tests {
    use super::*;

    #[test]
    fn test_two_lines_single_thread() {
        let recorder = Recorder::default();
        let summary = run(b"ab\ncd\n", Config::default(), &recorder).unwrap();

        assert!(summary.is_complete());
        assert_eq!(summary.lines(), 2);
        assert_eq!(summary.input_len(), 6);
        assert_eq!(summary.ranges(), &[LineRange::from_range_unchecked(0, 6)]);

        let slices = recorder.sorted();
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].start(), 0);
        assert_eq!(slices[0].size(), 6);
        assert_eq!(
            slices[0].lines(),
            &[Line::text("ab"), Line::LF, Line::text("cd"), Line::LF]
        );
    }

    #[test]
    fn test_line_count_matches_text_entries() {
        let data = b"alpha\nbeta\r\ngamma\n\ndelta\repsilon";
        for threads in 1..=8 {
            let recorder = Recorder::default();
            let summary = run(data, Config::default().threads(threads), &recorder).unwrap();

            let text_entries: usize = recorder.sorted().iter().map(Slice::line_count).sum();
            assert_eq!(summary.lines(), text_entries as u64, "threads {threads}");
        }
    }

    #[test]
    fn test_slices_cover_input_in_order() {
        let data = b"123456789\n".repeat(100);
        let recorder = Recorder::default();
        let summary = run(&data, Config::default().threads(4).buffer_size(64), &recorder).unwrap();

        assert_eq!(summary.ranges().len(), 4);
        let slices = recorder.sorted();
        let ranges: Vec<LineRange> = slices.iter().map(Slice::range).collect();
        assert_eq!(ranges, summary.ranges());
        assert_eq!(summary.lines(), 100);

        let rebuilt: String = slices
            .iter()
            .flat_map(|s| s.lines().iter().map(Line::as_str))
            .collect();
        assert_eq!(rebuilt.as_bytes(), &data[..]);
    }

    #[test]
    fn test_end_runs_after_every_slice() {
        let data = b"one\ntwo\nthree\nfour\nfive\nsix\nseven\neight\n";
        for threads in 1..=8 {
            let recorder = Recorder::default();
            let summary = run(data, Config::default().threads(threads), &recorder).unwrap();

            let delivered = recorder.slices.lock().len();
            assert_eq!(delivered, summary.ranges().len());
            assert_eq!(*recorder.delivered_at_end.lock(), Some(delivered), "threads {threads}");
        }
    }

    #[test]
    fn test_buffered_matches_mapped() {
        let data = "première ligne\nzweite Zeile\r\n第三行\n".as_bytes();
        let mut results = Vec::new();

        for mode in [ReadMode::Mapped, ReadMode::Buffered] {
            let recorder = Recorder::default();
            let config = Config::default().threads(3).buffer_size(5).read_mode(mode);
            let summary = run(data, config, &recorder).unwrap();
            assert!(summary.is_complete());
            results.push(recorder.sorted());
        }
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn test_crlf_aware_keeps_pairs_together() {
        let recorder = Recorder::default();
        let config = Config::default()
            .threads(2)
            .terminators(TerminatorPolicy::CrLfAware);
        let summary = run(b"abc\r\nd\r\n", config, &recorder).unwrap();

        assert_eq!(summary.lines(), 2);
        let entries: Vec<Line> = recorder
            .sorted()
            .into_iter()
            .flat_map(Slice::into_lines)
            .collect();
        assert_eq!(
            entries,
            vec![Line::text("abc"), Line::CRLF, Line::text("d"), Line::CRLF]
        );
    }

    #[test]
    fn test_more_threads_than_lines() {
        let recorder = Recorder::default();
        let summary = run(b"a\n", Config::default().threads(8), &recorder).unwrap();

        assert!(summary.is_complete());
        assert_eq!(summary.lines(), 1);
        assert_eq!(summary.ranges().len(), 1);
    }
}

mod failure_tests {
    use super::*;

    /// Fails every slice that starts at byte 0
    #[derive(Default)]
    struct FailFirst {
        delivered: AtomicUsize,
        ended: AtomicBool,
    }

    impl SliceListener for FailFirst {
        fn on_slice(&self, slice: Slice) -> io::Result<()> {
            if slice.start() == 0 {
                return Err(io::Error::other("disk full"));
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_end(&self, _summary: &Summary) -> io::Result<()> {
            self.ended.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_failed_slice_does_not_stop_others() {
        let data = b"aaaa\nbbbb\ncccc\ndddd\n";
        let listener = FailFirst::default();
        let summary = run(data, Config::default().threads(4), &listener).unwrap();

        assert!(!summary.is_complete());
        assert_eq!(summary.failures().len(), 1);
        let failure = &summary.failures()[0];
        assert_eq!(failure.range.start(), 0);
        assert!(matches!(failure.error, Error::OutputWrite { .. }));

        assert_eq!(listener.delivered.load(Ordering::SeqCst), summary.ranges().len() - 1);
        assert!(listener.ended.load(Ordering::SeqCst));
    }

    #[test]
    fn test_decode_failure_is_scoped() {
        let data = b"fine\nfine\n\xff\xfe\nfine\n";
        let recorder = Recorder::default();
        let summary = run(data, Config::default().threads(4), &recorder).unwrap();

        assert_eq!(summary.failures().len(), 1);
        assert!(matches!(
            summary.failures()[0].error,
            Error::Decode { offset: 10, encoding: "UTF-8" }
        ));
        assert_eq!(recorder.slices.lock().len(), summary.ranges().len() - 1);
    }

    #[test]
    fn test_panicking_listener_is_reported() {
        struct Panics;

        impl SliceListener for Panics {
            fn on_slice(&self, slice: Slice) -> io::Result<()> {
                if slice.start() > 0 {
                    panic!("listener exploded");
                }
                Ok(())
            }
        }

        let summary = run(b"ab\ncd\nef\n", Config::default().threads(3), &Panics).unwrap();

        assert_eq!(summary.failures().len(), summary.ranges().len() - 1);
        for failure in summary.failures() {
            match &failure.error {
                Error::WorkerPanicked { message, .. } => assert_eq!(message, "listener exploded"),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_failures_sorted_by_start() {
        struct FailAll;

        impl SliceListener for FailAll {
            fn on_slice(&self, _slice: Slice) -> io::Result<()> {
                Err(io::Error::other("nope"))
            }
        }

        let data = b"1\n2\n3\n4\n5\n6\n7\n8\n";
        let summary = run(data, Config::default().threads(8), &FailAll).unwrap();

        let starts: Vec<u64> = summary.failures().iter().map(|f| f.range.start()).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
        assert_eq!(starts.len(), summary.ranges().len());
    }

    #[test]
    fn test_start_failure_aborts_run() {
        struct RefuseStart(AtomicUsize);

        impl SliceListener for RefuseStart {
            fn on_start(&self, _input_len: NonZeroU64) -> io::Result<()> {
                Err(io::Error::other("no output space"))
            }

            fn on_slice(&self, _slice: Slice) -> io::Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let listener = RefuseStart(AtomicUsize::new(0));
        let err = run(b"ab\ncd\n", Config::default().threads(2), &listener).unwrap_err();

        assert!(matches!(err, Error::Finalize(_)));
        assert_eq!(listener.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_end_failure_is_returned() {
        struct RefuseEnd;

        impl SliceListener for RefuseEnd {
            fn on_slice(&self, _slice: Slice) -> io::Result<()> {
                Ok(())
            }

            fn on_end(&self, _summary: &Summary) -> io::Result<()> {
                Err(io::Error::other("rename failed"))
            }
        }

        let err = run(b"ab\ncd\n", Config::default().threads(2), &RefuseEnd).unwrap_err();
        assert!(matches!(err, Error::Finalize(_)));
    }

    #[test]
    fn test_unfinished_assignment_is_recorded_before_arrival() {
        let failures = Mutex::new(Vec::new());
        let barrier =
            CompletionBarrier::new(NonZeroUsize::new(2).unwrap(), || failures.lock().len());
        let mut arrivals = barrier.arrivals().unwrap().into_iter();

        let first = Assignment {
            range: LineRange::from_range_unchecked(0, 3),
            failures: &failures,
            arrival: arrivals.next(),
        };
        let second = Assignment {
            range: LineRange::from_range_unchecked(3, 6),
            failures: &failures,
            arrival: arrivals.next(),
        };
        drop(arrivals);

        std::thread::scope(|scope| {
            scope.spawn(move || first.finish(Ok(())));
            while barrier.state() != (BarrierState::Armed { expected: 2, arrived: 1 }) {
                std::thread::yield_now();
            }
            // Last arrival: a worker whose spawn failed
            drop(second);
        });

        assert_eq!(barrier.into_outcome(), Some(1));
        let failures = failures.into_inner();
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            failures[0].error,
            Error::WorkerNotRun { range } if range == LineRange::from_range_unchecked(3, 6)
        ));
    }
}

mod input_tests {
    use super::*;

    #[test]
    fn test_empty_file_rejected_before_start() {
        let recorder = Recorder::default();
        let err = run(b"", Config::default().threads(4), &recorder).unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.is_fatal());
        assert!(!recorder.started.load(Ordering::SeqCst));
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = tempdir().unwrap();
        let reader = LineReader::new(dir.path().join("absent.txt"), Config::default()).unwrap();

        let recorder = Recorder::default();
        let err = reader.execute(&recorder).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!recorder.started.load(Ordering::SeqCst));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (_dir, path) = input(b"ab\n");
        assert!(matches!(
            LineReader::new(&path, Config::default().threads(0)),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            LineReader::new(&path, Config::default().encoding("no-such-charset")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_ranges_preview_matches_execute() {
        let data = b"123456789\n".repeat(100);
        let (_dir, path) = input(&data);
        let reader = LineReader::new(&path, Config::default().threads(4)).unwrap();

        let preview = reader.ranges().unwrap();
        let summary = reader.execute(&Recorder::default()).unwrap();
        assert_eq!(preview, summary.ranges());
        assert_eq!(reader.path(), path.as_path());
        assert_eq!(reader.encoding(), encoding_rs::UTF_8);
    }

    #[test]
    fn test_line_counter() {
        let counter = LineCounter::new();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..250 {
                        counter.increment();
                    }
                });
            }
        });
        assert_eq!(counter.get(), 1000);
    }
}
