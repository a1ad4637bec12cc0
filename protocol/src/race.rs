use std::future::Future;

/// The winner of a [`race_first`]. The losing future is dropped by
/// `tokio::select!` before this value is produced — this is the
/// cancellation point behind "every long-running task must be cancellable
/// at its next suspension point" (the spec's concurrency model).
#[derive(Debug)]
pub enum Either<L, R> {
    Left(L),
    Right(R),
}

/// Wait for whichever of `left`/`right` completes first, dropping (and so
/// cancelling) the other. One primitive backs every "race two cooperative
/// tasks, keep only the winner" site in this system — the bridge's two
/// forwarders, the broker client handler's pop-free-vs-abort race, and the
/// game server's wait-for-second-player-vs-abort race — grounded on
/// `original_source/utils.py`'s single `wait_until_first_completed`, which
/// the original imports into both `webserver/client_handler.py` and
/// `server/game_server.py` rather than reimplementing per call site.
pub async fn race_first<L, R, FL, FR>(left: FL, right: FR) -> Either<L, R>
where
    FL: Future<Output = L>,
    FR: Future<Output = R>,
{
    tokio::select! {
        l = left => Either::Left(l),
        r = right => Either::Right(r),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn left_wins_when_it_completes_first() {
        let left = async {
            sleep(Duration::from_millis(10)).await;
            "left"
        };
        let right = async {
            sleep(Duration::from_secs(10)).await;
            "right"
        };

        match race_first(left, right).await {
            Either::Left(v) => assert_eq!(v, "left"),
            Either::Right(_) => panic!("expected left to win"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn right_wins_when_it_completes_first() {
        let left = async {
            sleep(Duration::from_secs(10)).await;
            1
        };
        let right = async {
            sleep(Duration::from_millis(10)).await;
            2
        };

        match race_first(left, right).await {
            Either::Right(v) => assert_eq!(v, 2),
            Either::Left(_) => panic!("expected right to win"),
        }
    }
}
