use std::hint::black_box;
use std::panic::panic_any;

use panic_guard::*;

#[derive(Debug, PartialEq)]
struct NotFoundError;

#[derive(Debug, PartialEq)]
struct TimeoutError;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn escaped_payload(f: impl FnOnce() + std::panic::UnwindSafe) -> Box<dyn std::any::Any + Send> {
    std::panic::catch_unwind(f).expect_err("panic was supposed to escape the guard")
}

#[test]
fn matching_payload_is_returned() {
    init_tracing();
    let error = catch_only::<NotFoundError, _>(|| panic_any(NotFoundError)).unwrap_err();
    assert_eq!(error.downcast_ref::<NotFoundError>(), Some(&NotFoundError));
    assert!(error.description().ends_with("NotFoundError"));
}

#[test]
fn other_payload_is_raised_again_with_stack() -> eyre::Result<()> {
    init_tracing();
    let payload = escaped_payload(|| {
        let _ = catch_only::<TimeoutError, _>(|| panic_any(NotFoundError));
    });
    let Ok(captured) = payload.downcast::<CapturedPanic>() else {
        eyre::bail!("re-raised payload was not wrapped");
    };
    eyre::ensure!(captured.is::<NotFoundError>(), "payload type changed");
    eyre::ensure!(!captured.stack().is_empty(), "stack trace is missing");
    Ok(())
}

#[test]
fn string_filter_distinguishes_owned_and_static() {
    let error = catch_only::<String, _>(|| panic!("code {}", 3)).unwrap_err();
    assert_eq!(error.message(), Some("code 3"));

    let payload = escaped_payload(|| {
        let _ = catch_only::<String, _>(|| panic!("static"));
    });
    let captured = payload.downcast::<CapturedPanic>().unwrap();
    assert_eq!(captured.message(), Some("static"));
}

#[test]
fn filter_does_not_catch_faults() {
    let payload = escaped_payload(|| {
        let _ = catch_only::<String, _>(|| {
            let items = [1_u8, 2, 3];
            black_box(items[black_box(7)]);
        });
    });
    assert!(payload.is::<String>());
    assert_eq!(Fault::classify(&*payload), Some(Fault::IndexOutOfBounds));
}

#[test]
fn inner_guard_only_sees_its_own_scope() {
    let error = catch(|| {
        let inner = catch(|| "fine");
        assert_eq!(inner.ok(), Some("fine"));
        panic_any(9_u8);
    })
    .unwrap_err();
    assert_eq!(error.downcast_ref::<u8>(), Some(&9));
}

#[test]
fn filtered_out_panic_reaches_outer_guard() {
    init_tracing();
    let error = catch(|| {
        let _ = catch_only::<TimeoutError, _>(|| panic_any(NotFoundError));
        unreachable!("inner guard returned for a filtered payload");
    })
    .unwrap_err();
    assert!(!error.is::<CapturedPanic>());
    assert!(error.is::<NotFoundError>());
}

#[test]
fn outer_filter_checks_original_payload() {
    let error = catch_only::<NotFoundError, _>(|| {
        let _ = catch_only::<TimeoutError, _>(|| panic_any(NotFoundError));
    })
    .unwrap_err();
    assert!(error.is::<NotFoundError>());
    assert!(!error.stack().is_empty());
}

#[test]
fn every_level_rejects() {
    let payload = escaped_payload(|| {
        let _ = catch_only::<NotFoundError, _>(|| {
            let _ = catch_only::<TimeoutError, _>(|| panic_any(1.5_f32));
        });
    });
    let captured = payload.downcast::<CapturedPanic>().unwrap();
    assert_eq!(captured.downcast_ref::<f32>(), Some(&1.5));
    assert_eq!(captured.description(), "1.5");
}

#[test]
fn outer_guard_applies_its_own_stack_limit() {
    let error = Guard::new()
        .stack_limit(MIN_STACK_LIMIT)
        .catch(|| {
            let _ = catch_only::<TimeoutError, _>(|| panic_any(NotFoundError));
        })
        .unwrap_err();
    assert!(error.stack().len() <= MIN_STACK_LIMIT);
    assert!(!error.stack().is_empty());
}

#[test]
fn outer_filter_names_reused_payload() {
    let direct = catch_only::<NotFoundError, _>(|| panic_any(NotFoundError)).unwrap_err();
    let nested = catch_only::<NotFoundError, _>(|| {
        let _ = catch_only::<TimeoutError, _>(|| panic_any(NotFoundError));
    })
    .unwrap_err();
    assert_eq!(nested.description(), direct.description());
    assert!(nested.description().ends_with("NotFoundError"));
}
