//! Test assertion macros.

/// Assert that a result is Ok.
///
/// # Example
///
/// ```ignore
/// let result = dispatcher.enqueue::<TestJob>((3, 4), EnqueueOptions::new()).await;
/// assert_ok!(result);
/// assert_ok!(result, "enqueue should succeed");
/// ```
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match &$expr {
            Ok(_) => (),
            Err(e) => panic!("assertion failed: expected Ok, got Err({:?})", e),
        }
    };
    ($expr:expr, $($arg:tt)+) => {
        match &$expr {
            Ok(_) => (),
            Err(e) => panic!("assertion failed: {}: expected Ok, got Err({:?})", format_args!($($arg)+), e),
        }
    };
}

/// Assert that a result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match &$expr {
            Err(_) => (),
            Ok(v) => panic!("assertion failed: expected Err, got Ok({:?})", v),
        }
    };
    ($expr:expr, $($arg:tt)+) => {
        match &$expr {
            Err(_) => (),
            Ok(v) => panic!("assertion failed: {}: expected Err, got Ok({:?})", format_args!($($arg)+), v),
        }
    };
}

/// Assert that an error matches a specific variant.
///
/// # Example
///
/// ```ignore
/// let result = worker.work_one_job(&broker).await;
/// assert_err_variant!(result, StokerError::ConnectionNotEstablished);
/// ```
#[macro_export]
macro_rules! assert_err_variant {
    ($expr:expr, $variant:pat) => {
        match &$expr {
            Err($variant) => (),
            Err(e) => panic!(
                "assertion failed: expected {}, got {:?}",
                stringify!($variant),
                e
            ),
            Ok(v) => panic!(
                "assertion failed: expected Err({}), got Ok({:?})",
                stringify!($variant),
                v
            ),
        }
    };
}

/// Assert that a job was put on a tube of a recording broker.
///
/// # Example
///
/// ```ignore
/// assert_job_enqueued!(broker, "test-plain");
/// assert_job_enqueued!(broker, "test-plain", |put| put.priority == 2000);
/// ```
#[macro_export]
macro_rules! assert_job_enqueued {
    ($broker:expr, $tube:expr) => {
        $broker.assert_put($tube);
    };
    ($broker:expr, $tube:expr, $predicate:expr) => {
        $broker.assert_put_with($tube, $predicate);
    };
}

/// Assert that nothing was put on a tube of a recording broker.
#[macro_export]
macro_rules! assert_job_not_enqueued {
    ($broker:expr, $tube:expr) => {
        $broker.assert_not_put($tube);
    };
}

#[cfg(test)]
mod tests {
    use crate::error::StokerError;

    #[test]
    fn test_assert_ok_macro() {
        let result: Result<i32, String> = Ok(42);
        assert_ok!(result);
    }

    #[test]
    #[should_panic(expected = "expected Ok")]
    fn test_assert_ok_macro_fails() {
        let result: Result<i32, String> = Err("error".to_string());
        assert_ok!(result);
    }

    #[test]
    #[should_panic(expected = "expected Err")]
    fn test_assert_err_macro_fails() {
        let result: Result<i32, String> = Ok(42);
        assert_err!(result);
    }

    #[test]
    fn test_assert_err_variant() {
        let result: Result<(), StokerError> = Err(StokerError::NoTubesConfigured);
        assert_err_variant!(result, StokerError::NoTubesConfigured);
    }

    #[test]
    #[should_panic(expected = "NoTubesConfigured")]
    fn test_assert_err_variant_fails() {
        let result: Result<(), StokerError> = Err(StokerError::ConnectionNotEstablished);
        assert_err_variant!(result, StokerError::NoTubesConfigured);
    }
}
