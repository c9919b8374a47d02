use crate::gpu::Gpu;

type Task<G> = Box<dyn FnOnce(&mut G)>;

/// GPU work postponed to the start of the next frame.
///
/// Disposing a canvas while its texture is still on screen would free a
/// resource the current frame references.  Disposal is queued here instead
/// and the host drains the queue before drawing anything else.
pub struct DisposalQueue<G: Gpu> {
    tasks: Vec<Task<G>>,
}

impl<G: Gpu> DisposalQueue<G> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn defer(&mut self, task: impl FnOnce(&mut G) + 'static) {
        self.tasks.push(Box::new(task));
    }

    /// Schedule destruction of a renderer's retired buffers.
    pub fn retire_buffers(&mut self, buffers: G::Buffers) {
        self.defer(move |gpu| gpu.destroy_buffers(buffers));
    }

    /// Schedule destruction of a canvas target.
    pub fn retire_target(&mut self, target: G::Target) {
        self.defer(move |gpu| gpu.destroy_target(target));
    }

    /// Run every queued task in submission order.  Returns how many ran.
    pub fn drain(&mut self, gpu: &mut G) -> usize {
        let tasks = std::mem::take(&mut self.tasks);
        let count = tasks.len();
        for task in tasks {
            task(gpu);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<G: Gpu> Default for DisposalQueue<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Gpu> Drop for DisposalQueue<G> {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            log::warn!("[deferred] {} disposal tasks never ran", self.tasks.len());
        }
    }
}
