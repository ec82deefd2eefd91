//! LOGIN and LOGOUT, the two ends of an authenticated session.
//!
//! The fake server never checks credentials. Depending on how it was
//! started it accepts every LOGIN or answers each one with
//! `NO [AUTHENTICATIONFAILED]` and hangs up.
//!
//! LOGOUT is answered with an untagged BYE and then the tagged OK,
//! after which the server closes the connection.

use crate::fake_imap::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle LOGIN. Returns whether the session may continue.
pub async fn handle_login<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    accept: bool,
    stream: &mut BufReader<S>,
) -> bool {
    let resp = if accept {
        format!("{tag} OK LOGIN completed\r\n")
    } else {
        format!("{tag} NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
    };
    write_line(stream, &resp).await.is_ok() && accept
}

/// Handle LOGOUT.
pub async fn handle_logout<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    stream: &mut BufReader<S>,
) {
    let goodbye = format!("* BYE Fake server logging out\r\n{tag} OK LOGOUT completed\r\n");
    let _ = write_line(stream, &goodbye).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, DuplexStream};

    /// Drop the server half and collect everything written to the client.
    async fn written(client: DuplexStream, server: BufReader<DuplexStream>) -> String {
        drop(server);
        let mut out = String::new();
        BufReader::new(client).read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn accepted_login_keeps_session() {
        let (client, server) = tokio::io::duplex(1024);
        let mut stream = BufReader::new(server);

        assert!(handle_login("A0001", true, &mut stream).await);
        assert_eq!(written(client, stream).await, "A0001 OK LOGIN completed\r\n");
    }

    #[tokio::test]
    async fn rejected_login_ends_session() {
        let (client, server) = tokio::io::duplex(1024);
        let mut stream = BufReader::new(server);

        assert!(!handle_login("A0001", false, &mut stream).await);
        let out = written(client, stream).await;
        assert!(out.starts_with("A0001 NO [AUTHENTICATIONFAILED]"));
    }

    #[tokio::test]
    async fn logout_says_bye_before_ok() {
        let (client, server) = tokio::io::duplex(1024);
        let mut stream = BufReader::new(server);

        handle_logout("A0007", &mut stream).await;
        let out = written(client, stream).await;
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("* BYE"));
        assert_eq!(lines[1], "A0007 OK LOGOUT completed");
    }
}
