// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Turns token-based list RPCs into lazy page and element iteration.
//!
//! A list method takes a request with a page-token field and returns a
//! response with a next-page-token field and a list of resources. An empty
//! next-page token is the end-of-list sentinel.
//!
//! [Page::fetch] issues one RPC and wraps the response. [PageStream] and
//! [ItemStream] are pull-based [futures::Stream]s: they fetch the next page
//! only when the consumer advances past the previous one, they are
//! forward-only, and they are not restartable. Fetch errors surface at the
//! point of advancement.

use crate::Result;
use crate::error::Error;
use futures::stream::unfold;
use futures::{Stream, StreamExt};
use pin_project::pin_project;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

/// A list request with a page-token field.
pub trait PagedRequest: Clone + Send + Sync + 'static {
    /// Replaces the page token.
    fn set_page_token(&mut self, token: String);

    /// The configured page size, or `None` when the method has no page-size
    /// field.
    fn page_size(&self) -> Option<i32>;

    /// Sets the page size. Returns `false` when the method has no page-size
    /// field.
    fn set_page_size(&mut self, size: i32) -> bool;
}

/// A list response with a next-page-token field and a resource list.
pub trait PagedResponse: Send + 'static {
    type Item: Send + 'static;

    /// The token for the next page; empty means the list is complete.
    fn next_page_token(&self) -> &str;

    /// The resources in this page.
    fn resources(&self) -> &[Self::Item];

    /// Consumes the response, returning the resources.
    fn into_resources(self) -> Vec<Self::Item>;
}

/// The stored callable issuing one list RPC.
///
/// Typically a thin wrapper invoking a [Pipeline][crate::middleware::Pipeline]
/// with the method's options.
pub type PageFetcher<Req, Resp> =
    Arc<dyn Fn(Req) -> futures::future::BoxFuture<'static, Result<Resp>> + Send + Sync>;

/// One fetched page: the response plus the request that produced it.
pub struct Page<Req, Resp> {
    request: Req,
    response: Resp,
    fetcher: PageFetcher<Req, Resp>,
}

impl<Req, Resp> Page<Req, Resp>
where
    Req: PagedRequest,
    Resp: PagedResponse,
{
    /// Issues one RPC for `request` and wraps the response.
    ///
    /// This is the only constructor; a `Page` always represents a completed
    /// fetch, and fetch failures are visible in the return type.
    pub async fn fetch(fetcher: PageFetcher<Req, Resp>, request: Req) -> Result<Self> {
        let response = (fetcher)(request.clone()).await?;
        Ok(Self {
            request,
            response,
            fetcher,
        })
    }

    /// The response for this page.
    pub fn response(&self) -> &Resp {
        &self.response
    }

    /// The resources in this page.
    pub fn items(&self) -> &[Resp::Item] {
        self.response.resources()
    }

    /// Consumes the page, returning its resources.
    pub fn into_items(self) -> Vec<Resp::Item> {
        self.response.into_resources()
    }

    /// True unless this is the last page.
    pub fn has_next_page(&self) -> bool {
        !self.response.next_page_token().is_empty()
    }

    /// Fetches the next page.
    ///
    /// Clones the original request, replaces its page token, and optionally
    /// sets a page size. Calling this on the last page, or requesting a page
    /// size on a method without a page-size field, is a validation error.
    pub async fn next_page(&self, page_size: Option<i32>) -> Result<Self> {
        if !self.has_next_page() {
            return Err(Error::validation("the list has no more pages"));
        }
        let mut request = self.request.clone();
        request.set_page_token(self.response.next_page_token().to_string());
        if let Some(size) = page_size {
            if !request.set_page_size(size) {
                return Err(Error::validation(
                    "the method does not have a page-size field",
                ));
            }
        }
        Self::fetch(self.fetcher.clone(), request).await
    }

    fn next_state(&self) -> PageState<Req, Resp> {
        if !self.has_next_page() {
            return PageState::Done;
        }
        let mut request = self.request.clone();
        request.set_page_token(self.response.next_page_token().to_string());
        PageState::Pending {
            fetcher: self.fetcher.clone(),
            request,
        }
    }
}

impl<Req, Resp> std::fmt::Debug for Page<Req, Resp>
where
    Req: std::fmt::Debug,
    Resp: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("request", &self.request)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

enum PageState<Req, Resp> {
    First(Page<Req, Resp>),
    Pending {
        fetcher: PageFetcher<Req, Resp>,
        request: Req,
    },
    Done,
}

/// The result of a list method: the first page plus lazy iteration over the
/// rest.
pub struct PagedListResponse<Req, Resp> {
    first_page: Page<Req, Resp>,
}

impl<Req, Resp> PagedListResponse<Req, Resp>
where
    Req: PagedRequest,
    Resp: PagedResponse,
{
    /// Fetches the first page and wraps it.
    pub async fn fetch(fetcher: PageFetcher<Req, Resp>, request: Req) -> Result<Self> {
        let first_page = Page::fetch(fetcher, request).await?;
        Ok(Self { first_page })
    }

    /// The first page.
    pub fn page(&self) -> &Page<Req, Resp> {
        &self.first_page
    }

    /// A lazy stream of pages, starting with the first.
    pub fn pages(self) -> PageStream<Req, Resp> {
        PageStream::new(self.first_page)
    }

    /// A lazy stream over all elements, flattening pages in order.
    pub fn items(self) -> ItemStream<Req, Resp> {
        ItemStream::new(self.pages())
    }

    /// Re-windows the elements into collections of exactly `size`, fetching
    /// as many pages as needed per window. The last window may be short.
    ///
    /// The method must have a page-size field, and the request's configured
    /// page size must not exceed `size`.
    pub fn expand_to_fixed_size(self, size: usize) -> Result<FixedSizeCollection<Req, Resp>> {
        FixedSizeCollection::expand(self.first_page, size)
    }
}

/// A lazy, forward-only stream of [Page]s.
#[pin_project]
pub struct PageStream<Req, Resp> {
    #[pin]
    stream: Pin<Box<dyn Stream<Item = Result<Page<Req, Resp>>> + Send>>,
}

impl<Req, Resp> PageStream<Req, Resp>
where
    Req: PagedRequest,
    Resp: PagedResponse,
{
    fn new(first: Page<Req, Resp>) -> Self {
        let stream = unfold(PageState::First(first), |state| async move {
            match state {
                PageState::First(page) => {
                    let next = page.next_state();
                    Some((Ok(page), next))
                }
                PageState::Pending { fetcher, request } => {
                    match Page::fetch(fetcher, request).await {
                        Ok(page) => {
                            let next = page.next_state();
                            Some((Ok(page), next))
                        }
                        Err(e) => Some((Err(e), PageState::Done)),
                    }
                }
                PageState::Done => None,
            }
        });
        Self {
            stream: Box::pin(stream),
        }
    }

    /// Returns the next page, if any.
    pub fn next(&mut self) -> futures::stream::Next<'_, Self> {
        StreamExt::next(self)
    }
}

impl<Req, Resp> Stream for PageStream<Req, Resp> {
    type Item = Result<Page<Req, Resp>>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.project().stream.poll_next(cx)
    }
}

/// A lazy stream over the elements of all pages, in page order.
#[pin_project]
pub struct ItemStream<Req, Resp>
where
    Resp: PagedResponse,
{
    #[pin]
    stream: Pin<Box<dyn Stream<Item = Result<Resp::Item>> + Send>>,
    _marker: std::marker::PhantomData<Req>,
}

impl<Req, Resp> ItemStream<Req, Resp>
where
    Req: PagedRequest,
    Resp: PagedResponse,
{
    fn new(pages: PageStream<Req, Resp>) -> Self {
        let stream = unfold(
            (pages, VecDeque::new()),
            |(mut pages, mut buffer)| async move {
                loop {
                    if let Some(item) = buffer.pop_front() {
                        return Some((Ok(item), (pages, buffer)));
                    }
                    match pages.next().await {
                        Some(Ok(page)) => buffer.extend(page.into_items()),
                        Some(Err(e)) => return Some((Err(e), (pages, buffer))),
                        None => return None,
                    }
                }
            },
        );
        Self {
            stream: Box::pin(stream),
            _marker: std::marker::PhantomData,
        }
    }

    /// Returns the next element, if any.
    pub fn next(&mut self) -> futures::stream::Next<'_, Self> {
        StreamExt::next(self)
    }
}

impl<Req, Resp> Stream for ItemStream<Req, Resp>
where
    Resp: PagedResponse,
{
    type Item = Result<Resp::Item>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.project().stream.poll_next(cx)
    }
}

/// Re-windows list elements into fixed-size collections.
#[pin_project]
pub struct FixedSizeCollection<Req, Resp>
where
    Resp: PagedResponse,
{
    #[pin]
    stream: Pin<Box<dyn Stream<Item = Result<Vec<Resp::Item>>> + Send>>,
    _marker: std::marker::PhantomData<Req>,
}

impl<Req, Resp> FixedSizeCollection<Req, Resp>
where
    Req: PagedRequest,
    Resp: PagedResponse,
{
    /// Creates the collection stream over `first_page` and its successors.
    ///
    /// Fails with a validation error when the method has no page-size field
    /// or the configured page size exceeds `size`.
    pub fn expand(first_page: Page<Req, Resp>, size: usize) -> Result<Self> {
        let Some(page_size) = first_page.request.page_size() else {
            return Err(Error::validation(
                "fixed-size collections require a method with a page-size field",
            ));
        };
        if i64::from(page_size) > size as i64 {
            return Err(Error::validation(format!(
                "the configured page size ({page_size}) exceeds the collection size ({size})"
            )));
        }
        let pages = PageStream::new(first_page);
        let stream = unfold(
            (pages, VecDeque::new(), false),
            move |(mut pages, mut buffer, mut exhausted)| async move {
                loop {
                    if buffer.len() >= size {
                        let batch: Vec<_> = buffer.drain(..size).collect();
                        return Some((Ok(batch), (pages, buffer, exhausted)));
                    }
                    if exhausted {
                        if buffer.is_empty() {
                            return None;
                        }
                        let batch: Vec<_> = buffer.drain(..).collect();
                        return Some((Ok(batch), (pages, buffer, exhausted)));
                    }
                    match pages.next().await {
                        Some(Ok(page)) => buffer.extend(page.into_items()),
                        Some(Err(e)) => return Some((Err(e), (pages, buffer, true))),
                        None => exhausted = true,
                    }
                }
            },
        );
        Ok(Self {
            stream: Box::pin(stream),
            _marker: std::marker::PhantomData,
        })
    }

    /// Returns the next collection, if any.
    pub fn next(&mut self) -> futures::stream::Next<'_, Self> {
        StreamExt::next(self)
    }
}

impl<Req, Resp> Stream for FixedSizeCollection<Req, Resp>
where
    Resp: PagedResponse,
{
    type Item = Result<Vec<Resp::Item>>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.project().stream.poll_next(cx)
    }
}
