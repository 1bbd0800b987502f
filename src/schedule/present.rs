use std::cell::RefCell;
use std::rc::Rc;

use crate::foundation::error::StripesError;
use crate::foundation::params::RenderParameters;

/// Where the scheduler reads the live parameters at the moment an attempt starts.
pub trait ParameterSource {
    /// Capture the current parameters.
    fn current(&self) -> RenderParameters;
}

/// A successfully rendered image together with the parameters it was rendered from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedImage {
    /// Parameters the worker rendered.
    pub params: RenderParameters,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
}

/// Receives render outcomes on the UI side.
pub trait Presenter {
    /// Show a freshly rendered image.
    fn present(&mut self, image: RenderedImage);

    /// A render attempt failed. The previously presented image stays current.
    fn render_failed(&mut self, _err: &StripesError) {}

    /// Loading indicator: `true` on every request, `false` once the scheduler is idle again.
    fn set_busy(&mut self, _busy: bool) {}
}

/// Parameters shared between a host (or test) and the scheduler.
#[derive(Clone, Debug, Default)]
pub struct SharedParameters(Rc<RefCell<RenderParameters>>);

impl SharedParameters {
    /// Start from `params`.
    pub fn new(params: RenderParameters) -> Self {
        Self(Rc::new(RefCell::new(params)))
    }

    /// Replace the live parameters.
    pub fn set(&self, params: RenderParameters) {
        *self.0.borrow_mut() = params;
    }

    /// Edit the live parameters in place.
    pub fn update(&self, edit: impl FnOnce(&mut RenderParameters)) {
        edit(&mut self.0.borrow_mut());
    }
}

impl ParameterSource for SharedParameters {
    fn current(&self) -> RenderParameters {
        self.0.borrow().clone()
    }
}

/// Presenter that keeps the most recent image, for save and copy actions.
#[derive(Debug, Default)]
pub struct RetainingPresenter {
    latest: Option<RenderedImage>,
    presented: u64,
    failures: Vec<String>,
    busy: bool,
}

impl RetainingPresenter {
    /// Most recently presented image.
    pub fn latest(&self) -> Option<&RenderedImage> {
        self.latest.as_ref()
    }

    /// Number of images presented so far.
    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Messages of every failed render, oldest first.
    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// Current state of the loading indicator.
    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

impl Presenter for RetainingPresenter {
    fn present(&mut self, image: RenderedImage) {
        self.presented += 1;
        self.latest = Some(image);
    }

    fn render_failed(&mut self, err: &StripesError) {
        self.failures.push(err.to_string());
    }

    fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }
}
