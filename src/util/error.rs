/// エラー分類とリトライ判定ユーティリティ。
use anyhow::Error;

/// エラーの種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// リトライ可能なエラー（一時的な接続エラー、タイムアウトなど）
    Retryable,
    /// リトライ不可能なエラー（データ不在、検証エラーなど）
    NonRetryable,
    /// 致命的なエラー（認証エラー、設定エラーなど）
    Fatal,
}

/// エラーがリトライ可能かどうかを判定する。
#[must_use]
pub(crate) fn classify_error(error: &Error) -> ErrorKind {
    if error.downcast_ref::<r2d2::Error>().is_some() {
        // Pool exhaustion or a dead connection manager: the same transient
        // unavailability a dropped connection would produce, so treat it
        // the same way.
        return ErrorKind::Retryable;
    }

    if let Some(redis_err) = error.downcast_ref::<redis::RedisError>() {
        if redis_err.is_connection_dropped()
            || redis_err.is_connection_refusal()
            || redis_err.is_timeout()
        {
            return ErrorKind::Retryable;
        }

        match redis_err.kind() {
            redis::ErrorKind::TryAgain | redis::ErrorKind::MasterDown | redis::ErrorKind::IoError => {
                ErrorKind::Retryable
            }
            redis::ErrorKind::AuthenticationFailed => ErrorKind::Fatal,
            _ => ErrorKind::NonRetryable,
        }
    } else {
        ErrorKind::NonRetryable
    }
}

/// エラーがリトライ可能かどうかを判定する。
#[must_use]
pub(crate) fn is_retryable(error: &Error) -> bool {
    matches!(classify_error(error), ErrorKind::Retryable)
}

/// エラーが致命的かどうかを判定する。
#[must_use]
pub(crate) fn is_fatal(error: &Error) -> bool {
    matches!(classify_error(error), ErrorKind::Fatal)
}
