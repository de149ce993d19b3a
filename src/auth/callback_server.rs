//! OAuth2 loopback callback server
//!
//! A temporary local HTTP server that captures the implicit-grant redirect. The
//! fragment of a redirect never reaches a server, so `/callback` serves a tiny page
//! that relays `location.hash` back to `/fragment?<params>`, where it is captured.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;
use crate::Result;
use crate::error::Error;

/// Default callback port
pub const CALLBACK_PORT: u16 = 8085;

const CALLBACK_PATH: &str = "/callback";
const FRAGMENT_PATH: &str = "/fragment";

/// Page served on the redirect URI; forwards the fragment as a query string
const RELAY_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Mailsense | Signing in</title>
</head>
<body>
    <p>Finishing sign-in&hellip;</p>
    <script>
        window.location.replace("/fragment?" + window.location.hash.replace(/^#/, ""));
    </script>
</body>
</html>"#;

/// Success HTML page shown after authorization
const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Mailsense | Signed in</title>
    <style>
        body {
            background-color: #0b0e14;
            color: #e2e8f0;
            font-family: 'Inter', -apple-system, system-ui, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
            text-align: center;
        }
        h1 { font-size: 24px; color: #38bdf8; }
        p { font-size: 15px; color: #94a3b8; line-height: 1.6; }
    </style>
</head>
<body>
    <div>
        <h1>Signed in</h1>
        <p>Mailsense has been granted access.<br>You can close this window and return to your terminal.</p>
    </div>
</body>
</html>"#;

/// Error HTML page
const ERROR_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Mailsense | Sign-in failed</title>
    <style>
        body {
            background-color: #0b0e14;
            color: #e2e8f0;
            font-family: 'Inter', -apple-system, system-ui, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
            text-align: center;
        }
        h1 { font-size: 24px; color: #ef4444; }
        p { font-size: 15px; color: #94a3b8; line-height: 1.6; }
    </style>
</head>
<body>
    <div>
        <h1>Sign-in failed</h1>
        <p>Google did not return an access token.<br>Please try again or check your terminal.</p>
    </div>
</body>
</html>"#;

/// What a single request to the callback server asked for
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    /// The provider's redirect landed; the fragment is still in the browser
    Relay,
    /// The relay page posted the fragment back
    Fragment(String),
    NotFound,
}

/// Get the callback redirect URI
pub fn redirect_uri(port: u16) -> String {
    format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH)
}

/// Bind the callback listener. Bind before opening the browser so the redirect cannot race us.
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await
        .map_err(|e| Error::OAuth(format!("Failed to start callback server on {}: {}", addr, e)))?;

    tracing::info!("Callback server listening on http://{}", addr);
    Ok(listener)
}

/// Serve requests until the relayed fragment arrives.
///
/// Returns the full redirect URL, `<redirect_uri>#<fragment>`.
pub async fn wait_for_redirect(listener: TcpListener, port: u16) -> Result<String> {
    loop {
        let (mut socket, _) = listener.accept().await
            .map_err(|e| Error::OAuth(format!("Failed to accept connection: {}", e)))?;

        let mut buffer = vec![0u8; 8192];
        let n = socket.read(&mut buffer).await
            .map_err(|e| Error::OAuth(format!("Failed to read request: {}", e)))?;

        let request = String::from_utf8_lossy(&buffer[..n]);

        match parse_request(&request) {
            Ok(Route::Relay) => {
                respond(&mut socket, "200 OK", RELAY_HTML).await;
            }
            Ok(Route::Fragment(fragment)) => {
                let has_token = url::form_urlencoded::parse(fragment.as_bytes())
                    .any(|(k, v)| k == "access_token" && !v.is_empty());
                let (status, body) = if has_token {
                    ("200 OK", SUCCESS_HTML)
                } else {
                    ("400 Bad Request", ERROR_HTML)
                };
                respond(&mut socket, status, body).await;

                let mut redirect = redirect_uri(port);
                if !fragment.is_empty() {
                    redirect.push('#');
                    redirect.push_str(&fragment);
                }
                return Ok(redirect);
            }
            Ok(Route::NotFound) => {
                respond(&mut socket, "404 Not Found", "").await;
            }
            Err(e) => {
                respond(&mut socket, "400 Bad Request", ERROR_HTML).await;
                return Err(e);
            }
        }
    }
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Parse the request line into a [`Route`]
fn parse_request(request: &str) -> Result<Route> {
    // Extract the request line
    let first_line = request.lines().next()
        .ok_or_else(|| Error::OAuth("Empty request".to_string()))?;

    // Parse: GET /fragment?access_token=xxx&expires_in=3599 HTTP/1.1
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(Error::OAuth("Invalid request format".to_string()));
    }

    let full_url = format!("http://localhost{}", parts[1]);
    let url = Url::parse(&full_url)
        .map_err(|e| Error::OAuth(format!("Failed to parse callback URL: {}", e)))?;

    match url.path() {
        CALLBACK_PATH => Ok(Route::Relay),
        FRAGMENT_PATH => Ok(Route::Fragment(url.query().unwrap_or("").to_string())),
        _ => Ok(Route::NotFound),
    }
}

/// Turn a provider error carried in the fragment into an error message
pub fn provider_error(fragment: &str) -> Option<String> {
    let mut error = None;
    let mut error_description = None;

    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "error" => error = Some(value.to_string()),
            "error_description" => error_description = Some(value.to_string()),
            _ => {}
        }
    }

    error.map(|err| {
        let description = error_description.unwrap_or_else(|| "Unknown error".to_string());
        format!("Authorization failed: {} - {}", err, description)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relay() {
        let request = "GET /callback HTTP/1.1\r\nHost: 127.0.0.1:8085\r\n\r\n";
        assert_eq!(parse_request(request).unwrap(), Route::Relay);
    }

    #[test]
    fn test_parse_fragment() {
        let request = "GET /fragment?access_token=abc&expires_in=3599 HTTP/1.1\r\n\r\n";
        assert_eq!(
            parse_request(request).unwrap(),
            Route::Fragment("access_token=abc&expires_in=3599".to_string())
        );
    }

    #[test]
    fn test_parse_other_paths() {
        let request = "GET /favicon.ico HTTP/1.1\r\n\r\n";
        assert_eq!(parse_request(request).unwrap(), Route::NotFound);
        assert!(parse_request("").is_err());
        assert!(parse_request("GET\r\n").is_err());
    }

    #[test]
    fn test_provider_error() {
        let message = provider_error("error=access_denied&error_description=User+denied").unwrap();
        assert!(message.contains("access_denied"));
        assert!(message.contains("User denied"));
        assert!(provider_error("access_token=abc").is_none());
    }

    #[test]
    fn test_redirect_uri() {
        assert_eq!(redirect_uri(CALLBACK_PORT), "http://127.0.0.1:8085/callback");
    }

    #[tokio::test]
    async fn test_wait_for_redirect_relays_fragment() {
        let listener = bind(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(wait_for_redirect(listener, port));

        let client = reqwest::Client::new();
        let relay = client
            .get(format!("http://127.0.0.1:{}/callback", port))
            .send()
            .await
            .unwrap();
        assert!(relay.text().await.unwrap().contains("/fragment?"));

        let done = client
            .get(format!("http://127.0.0.1:{}/fragment?access_token=tok&expires_in=60", port))
            .send()
            .await
            .unwrap();
        assert!(done.status().is_success());

        let redirect = server.await.unwrap().unwrap();
        assert_eq!(
            redirect,
            format!("http://127.0.0.1:{}/callback#access_token=tok&expires_in=60", port)
        );
    }
}
