//! Static HTML responses.

use tokio::io::AsyncWrite;

use crate::http::response::{default_headers, ResponseError, ResponseWriter, StatusCode};

pub const OK_PAGE: &str = "
<html>
  <head>
    <title>200 OK</title>
  </head>
  <body>
    <h1>Success!</h1>
    <p>Your request was an absolute banger.</p>
  </body>
</html>";

pub const BAD_REQUEST_PAGE: &str = "
<html>
  <head>
    <title>400 Bad Request</title>
  </head>
  <body>
    <h1>Bad Request</h1>
    <p>Your request honestly kinda sucked.</p>
  </body>
</html>";

pub const INTERNAL_ERROR_PAGE: &str = "
<html>
  <head>
    <title>500 Internal Server Error</title>
  </head>
  <body>
    <h1>Internal Server Error</h1>
    <p>Okay, you know what? This one is on me.</p>
  </body>
</html>";

/// The page shown for a status code.
pub fn page_for(status: StatusCode) -> &'static str {
    match status {
        StatusCode::Ok => OK_PAGE,
        StatusCode::BadRequest => BAD_REQUEST_PAGE,
        StatusCode::InternalServerError => INTERNAL_ERROR_PAGE,
    }
}

/// Write a complete response carrying `body` with the given content type.
pub async fn respond<W>(
    writer: &mut ResponseWriter<W>,
    status: StatusCode,
    content_type: &str,
    body: &[u8],
) -> Result<(), ResponseError>
where
    W: AsyncWrite + Unpin,
{
    let mut headers = default_headers(body.len());
    headers.replace("Content-Type", content_type);
    writer.write_status_line(status).await?;
    writer.write_headers(&headers).await?;
    writer.write_body(body).await?;
    Ok(())
}

/// Write the HTML page for `status`.
pub async fn respond_page<W>(
    writer: &mut ResponseWriter<W>,
    status: StatusCode,
) -> Result<(), ResponseError>
where
    W: AsyncWrite + Unpin,
{
    respond(writer, status, "text/html", page_for(status).as_bytes()).await
}
