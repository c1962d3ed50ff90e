use http::{HeaderMap, Method, Request, Response, request, response};

/// The parts of an HTTP message that signatures can cover.
pub trait HttpMessage {
    /// The request method; `None` for responses.
    fn method(&self) -> Option<&Method>;

    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;
}

impl<B> HttpMessage for Request<B> {
    fn method(&self) -> Option<&Method> {
        Some(Request::method(self))
    }

    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        Request::headers_mut(self)
    }
}

impl<B> HttpMessage for Response<B> {
    fn method(&self) -> Option<&Method> {
        None
    }

    fn headers(&self) -> &HeaderMap {
        Response::headers(self)
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        Response::headers_mut(self)
    }
}

impl HttpMessage for request::Parts {
    fn method(&self) -> Option<&Method> {
        Some(&self.method)
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}

impl HttpMessage for response::Parts {
    fn method(&self) -> Option<&Method> {
        None
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}

/// All values of a header joined with `", "`, or `None` if the header is
/// absent or not valid UTF-8.
pub(crate) fn combined_header(headers: &HeaderMap, name: &str) -> Option<String> {
    let mut values = headers.get_all(name).iter().peekable();
    values.peek()?;
    values
        .map(|value| value.to_str().map(str::trim))
        .collect::<Result<Vec<_>, _>>()
        .ok()
        .map(|values| values.join(", "))
}
