//! Glue between reqwest responses and the execution layer.

use crate::outcome::ResponseMeta;
use reqwest::Response;

impl From<&Response> for ResponseMeta {
    fn from(response: &Response) -> Self {
        ResponseMeta::with_headers(response.status().as_u16(), response.headers().clone())
    }
}
