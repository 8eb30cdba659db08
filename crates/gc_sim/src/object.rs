use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Owned reference to a simulated object. The `Rc` strong count is the
/// object's ownership count.
pub type SimRef = Rc<SimObject>;

/// A simulated runtime object, stamped with the epoch that created it.
#[derive(Debug)]
pub struct SimObject {
	epoch: u64,
	value: SimValue,
}

impl SimObject {
	pub(crate) fn new(epoch: u64, value: SimValue) -> SimRef {
		Rc::new(Self { epoch, value })
	}

	/// Epoch in which this object was created.
	pub const fn epoch(&self) -> u64 {
		self.epoch
	}

	pub fn value(&self) -> &SimValue {
		&self.value
	}
}

/// Payload of a simulated object.
#[derive(Debug, Clone)]
pub enum SimValue {
	None,
	Bool(bool),
	Int(i64),
	Str(String),
	List(RefCell<Vec<SimRef>>),
	Module(SimModule),
	Builtin(Builtin),
}

impl SimValue {
	/// Type name as the runtime would report it in error messages.
	pub fn type_name(&self) -> &'static str {
		match self {
			Self::None => "NoneType",
			Self::Bool(_) => "bool",
			Self::Int(_) => "int",
			Self::Str(_) => "str",
			Self::List(_) => "list",
			Self::Module(_) => "module",
			Self::Builtin(_) => "builtin_function_or_method",
		}
	}
}

/// A simulated module: a name plus its attribute namespace.
#[derive(Debug, Clone)]
pub struct SimModule {
	pub(crate) name: String,
	pub(crate) attrs: HashMap<String, SimRef>,
}

impl SimModule {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn attr(&self, name: &str) -> Option<&SimRef> {
		self.attrs.get(name)
	}
}

/// Native functions exposed by the simulated `gc` module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
	Enable,
	Disable,
	IsEnabled,
	Collect,
}

impl Builtin {
	pub const ALL: [Self; 4] = [Self::Enable, Self::Disable, Self::IsEnabled, Self::Collect];

	pub const fn name(self) -> &'static str {
		match self {
			Self::Enable => "enable",
			Self::Disable => "disable",
			Self::IsEnabled => "isenabled",
			Self::Collect => "collect",
		}
	}
}

impl fmt::Display for Builtin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}
