/// Number of collector generations.
pub const GENERATIONS: usize = 3;

/// Collector state of one runtime epoch.
///
/// Unreachable objects are injected per generation by tests; collecting a
/// generation also collects every younger one.
#[derive(Debug, Clone, Default)]
pub(crate) struct Collector {
	disabled: bool,
	unreachable: [usize; GENERATIONS],
	collections: [usize; GENERATIONS],
}

impl Collector {
	pub fn is_enabled(&self) -> bool {
		!self.disabled
	}

	pub fn set_enabled(&mut self, enabled: bool) {
		self.disabled = !enabled;
	}

	pub fn track_unreachable(&mut self, generation: usize, count: usize) {
		self.unreachable[generation] += count;
	}

	pub fn collections(&self, generation: usize) -> usize {
		self.collections[generation]
	}

	/// Collects `generation` and all younger generations, returning the
	/// number of unreachable objects found.
	pub fn collect(&mut self, generation: usize) -> usize {
		let found = self.unreachable[..=generation].iter().sum();
		self.unreachable[..=generation].fill(0);
		self.collections[generation] += 1;
		found
	}
}
