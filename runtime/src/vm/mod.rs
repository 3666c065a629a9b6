use crate::class_loader::ClassPath;
use crate::error::VmError;
use crate::heap::method_area::MethodArea;
use crate::heap::{Heap, HeapRef, slot};
use crate::interpreter::Interpreter;
use crate::keys::{ClassId, Symbol, ThreadId};
use crate::native::NativeRegistry;
use crate::scheduler::Scheduler;
use crate::thread::VmThread;
use crate::throw_exception;
use crate::vm::bootstrap_registry::BootstrapRegistry;
use lasso::ThreadedRodeo;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing_log::log::error;

pub mod bootstrap_registry;
pub mod stack;
mod throw;

/// Stack operand, local variable, argument or decoded field value. Long and
/// double are category-2: two local slots, one stack value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Ref(HeapRef),
    Null,
    /// jsr return target; only ever lives in locals and on the stack.
    ReturnAddress(usize),
}

impl Value {
    pub fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    pub fn as_int(&self) -> Result<i32, VmError> {
        match self {
            Value::Integer(v) => Ok(*v),
            _ => Err(VmError::UnexpectedType("int")),
        }
    }

    pub fn as_long(&self) -> Result<i64, VmError> {
        match self {
            Value::Long(v) => Ok(*v),
            _ => Err(VmError::UnexpectedType("long")),
        }
    }

    pub fn as_float(&self) -> Result<f32, VmError> {
        match self {
            Value::Float(v) => Ok(*v),
            _ => Err(VmError::UnexpectedType("float")),
        }
    }

    pub fn as_double(&self) -> Result<f64, VmError> {
        match self {
            Value::Double(v) => Ok(*v),
            _ => Err(VmError::UnexpectedType("double")),
        }
    }

    pub fn as_obj_ref(&self) -> Result<HeapRef, VmError> {
        match self {
            Value::Ref(addr) => Ok(*addr),
            Value::Null => throw_exception!(NullPointerException),
            _ => Err(VmError::UnexpectedType("reference")),
        }
    }

    pub fn as_nullable_obj_ref(&self) -> Result<Option<HeapRef>, VmError> {
        match self {
            Value::Ref(addr) => Ok(Some(*addr)),
            Value::Null => Ok(None),
            _ => Err(VmError::UnexpectedType("reference")),
        }
    }
}

/// Monotonic wall-clock milliseconds; injectable so schedulers can be
/// driven deterministically in tests.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// A thread received a quantum.
    Executed,
    /// Live threads exist but none is runnable right now.
    Idle,
    /// No live threads remain, or shutdown was requested.
    Finished,
}

/// The aggregate VM context: registry, heap, scheduler, natives, clock and
/// shutdown state, passed explicitly to every component. Multiple isolated
/// VMs per process are fine.
pub struct VirtualMachine {
    method_area: RwLock<MethodArea>,
    heap: RwLock<Heap>,
    scheduler: RwLock<Scheduler>,
    pub native_registry: NativeRegistry,
    pub br: Arc<BootstrapRegistry>,
    interner: Arc<ThreadedRodeo>,
    string_pool: RwLock<HashMap<Symbol, HeapRef>>,
    clock: Arc<dyn Clock>,
    quantum: usize,
    quit: AtomicBool,
    exit_status: AtomicI32,
    main_thread: RwLock<Option<ThreadId>>,
}

impl VirtualMachine {
    pub const DEFAULT_QUANTUM: usize = 5_000;

    pub fn new_with(
        class_path: ClassPath,
        clock: Arc<dyn Clock>,
        quantum: usize,
    ) -> Result<Self, VmError> {
        let interner = Arc::new(ThreadedRodeo::new());
        let (method_area, br) = MethodArea::init(class_path, interner.clone())?;
        let native_registry = NativeRegistry::new(interner.clone());
        crate::native::preregistered::register_all(&native_registry);
        Ok(Self {
            method_area: RwLock::new(method_area),
            heap: RwLock::new(Heap::new()),
            scheduler: RwLock::new(Scheduler::new()),
            native_registry,
            br,
            interner,
            string_pool: RwLock::new(HashMap::new()),
            clock,
            quantum,
            quit: AtomicBool::new(false),
            exit_status: AtomicI32::new(0),
            main_thread: RwLock::new(None),
        })
    }

    pub fn method_area_read(&self) -> RwLockReadGuard<'_, MethodArea> {
        self.method_area.read().unwrap()
    }

    pub fn method_area_write(&self) -> RwLockWriteGuard<'_, MethodArea> {
        self.method_area.write().unwrap()
    }

    pub fn heap_read(&self) -> RwLockReadGuard<'_, Heap> {
        self.heap.read().unwrap()
    }

    pub fn heap_write(&self) -> RwLockWriteGuard<'_, Heap> {
        self.heap.write().unwrap()
    }

    pub fn scheduler_read(&self) -> RwLockReadGuard<'_, Scheduler> {
        self.scheduler.read().unwrap()
    }

    pub fn scheduler_write(&self) -> RwLockWriteGuard<'_, Scheduler> {
        self.scheduler.write().unwrap()
    }

    pub fn interner(&self) -> &ThreadedRodeo {
        &self.interner
    }

    pub fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    pub fn quantum(&self) -> usize {
        self.quantum
    }

    pub fn request_shutdown(&self) {
        self.quit.store(true, Ordering::Release);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    pub fn set_exit_status(&self, status: i32) {
        self.exit_status.store(status, Ordering::Release);
    }

    pub fn exit_status(&self) -> i32 {
        self.exit_status.load(Ordering::Acquire)
    }

    pub fn read_resource(&self, path: &str) -> Option<Vec<u8>> {
        self.method_area_write().class_loader_mut().read_resource(path)
    }

    pub fn resolve_class(&self, name: &str) -> Result<ClassId, VmError> {
        let sym = self.interner.get_or_intern(name);
        self.method_area_write().get_class_id_or_load(sym)
    }

    pub fn alloc_instance_of(&self, class_id: ClassId) -> HeapRef {
        let slots = self.method_area_read().get_class(&class_id).instance_slots();
        self.heap_write().alloc_instance(class_id, slots)
    }

    /// A string object over a fresh 16-bit code-unit array; `value`,
    /// `offset` and `count` fields are seeded where the string class
    /// declares them.
    pub fn string_from_units(&self, units: &[u16]) -> Result<HeapRef, VmError> {
        let string_class = match self.br.get_string_class_id() {
            Some(id) => id,
            None => {
                let sym = self.br.string_sym;
                self.method_area_write().get_class_id_or_load(sym)?
            }
        };
        let instance = self.alloc_instance_of(string_class);
        let char_array = self.heap_write().alloc_char_array(units);
        let ma = self.method_area_read();
        let class = ma.get_class(&string_class);
        let mut heap = self.heap_write();
        if let Some(offset) = class.field_offset(&self.br.string_value_fk) {
            heap.write_field(instance, offset, &Value::Ref(char_array))?;
        }
        if let Some(offset) = class.field_offset(&self.br.string_offset_fk) {
            heap.write_field(instance, offset, &Value::Integer(0))?;
        }
        if let Some(offset) = class.field_offset(&self.br.string_count_fk) {
            heap.write_field(instance, offset, &Value::Integer(units.len() as i32))?;
        }
        Ok(instance)
    }

    pub fn materialize_string(&self, s: &str) -> Result<HeapRef, VmError> {
        let units: Vec<u16> = s.encode_utf16().collect();
        self.string_from_units(&units)
    }

    /// String-literal interning: one object per distinct constant.
    pub fn intern_literal(&self, sym: Symbol) -> Result<HeapRef, VmError> {
        if let Some(handle) = self.string_pool.read().unwrap().get(&sym) {
            return Ok(*handle);
        }
        let text = self.interner.resolve(&sym).to_string();
        let handle = self.materialize_string(&text)?;
        self.string_pool.write().unwrap().insert(sym, handle);
        Ok(handle)
    }

    /// Read a string object back through its `value`/`offset`/`count`
    /// fields.
    pub fn read_java_string(&self, handle: HeapRef) -> Result<String, VmError> {
        let class_id = self
            .heap_read()
            .class_of(handle)?
            .ok_or(VmError::UnexpectedType("String"))?;
        let ma = self.method_area_read();
        let class = ma.get_class(&class_id);
        let value_offset = class
            .field_offset(&self.br.string_value_fk)
            .ok_or(VmError::UnexpectedType("String"))?;
        let offset_offset = class.field_offset(&self.br.string_offset_fk);
        let count_offset = class.field_offset(&self.br.string_count_fk);
        let heap = self.heap_read();
        let array = match heap.read_field(handle, value_offset, slot::SlotKind::Reference)? {
            Value::Ref(array) => array,
            _ => return Ok(String::new()),
        };
        let units = heap.char_array_units(array)?;
        let start = match offset_offset {
            Some(o) => heap.read_field(handle, o, slot::SlotKind::Int)?.as_int()? as usize,
            None => 0,
        };
        let count = match count_offset {
            Some(o) => heap.read_field(handle, o, slot::SlotKind::Int)?.as_int()? as usize,
            None => units.len(),
        };
        let end = (start + count).min(units.len());
        let start = start.min(end);
        Ok(String::from_utf16_lossy(&units[start..end]))
    }

    /// The class-mirror object for `ldc` class constants and `getClass`.
    pub fn class_mirror(&self, class_id: ClassId) -> Result<HeapRef, VmError> {
        if let Some(mirror) = self.method_area_read().get_class(&class_id).mirror() {
            return Ok(mirror);
        }
        let class_class_sym = self.br.class_sym;
        let class_class = self.method_area_write().get_class_id_or_load(class_class_sym)?;
        let dotted = {
            let ma = self.method_area_read();
            self.interner.resolve(&ma.get_class(&class_id).name).replace('/', ".")
        };
        let name_string = self.materialize_string(&dotted)?;
        let mirror = self.alloc_instance_of(class_class);
        {
            let ma = self.method_area_read();
            if let Some(offset) = ma.get_class(&class_class).field_offset(&self.br.class_name_fk) {
                self.heap_write().write_field(mirror, offset, &Value::Ref(name_string))?;
            }
            ma.get_class(&class_id).set_mirror(mirror);
        }
        Ok(mirror)
    }

    /// Register a thread whose frame stack is already built (top frame runs
    /// first).
    pub fn spawn_thread(&self, mut thread: VmThread) -> ThreadId {
        self.scheduler_write().spawn(move |id| {
            thread.id = id;
            thread
        })
    }

    /// Resolve the class and invoke `main(String[])` on a fresh thread.
    pub fn launch_main(&self, class_name: &str, args: &[String]) -> Result<ThreadId, VmError> {
        let class_id = self.resolve_class(class_name)?;
        let main_mk = self.br.main_mk;
        let target = self
            .method_area_read()
            .find_in_chain(class_id, &main_mk)
            .ok_or_else(|| VmError::HostFatal(format!("no main method in {class_name}")))?;

        let args_array = self.heap_write().alloc_array(args.len());
        for (i, arg) in args.iter().enumerate() {
            let string = self.materialize_string(arg)?;
            self.heap_write()
                .set_array_slot(args_array, i as i32, slot::encode(&Value::Ref(string)))?;
        }

        let frame =
            Interpreter::build_frame(self, target.method_id, &[Value::Ref(args_array)])?;
        let mut thread = VmThread::new(ThreadId::from_usize(0));
        thread.is_main = true;
        thread.stack.push_frame(frame)?;
        Interpreter::ensure_initialized(self, &mut thread, class_id)?;
        let id = self.spawn_thread(thread);
        *self.main_thread.write().unwrap() = Some(id);
        Ok(id)
    }

    /// MIDlet lifecycle: `<init>` then `startApp` on one thread, the
    /// constructor frame on top so it runs first.
    pub fn launch_midlet(&self, class_name: &str) -> Result<ThreadId, VmError> {
        let class_id = self.resolve_class(class_name)?;
        let instance = self.alloc_instance_of(class_id);
        let (start_app, constructor) = {
            let ma = self.method_area_read();
            let start_app = ma
                .find_in_chain(class_id, &self.br.start_app_mk)
                .ok_or_else(|| VmError::HostFatal(format!("no startApp in {class_name}")))?;
            let constructor = ma.find_in_chain(class_id, &self.br.no_arg_constructor_mk);
            (start_app, constructor)
        };

        let receiver = [Value::Ref(instance)];
        let mut thread = VmThread::new(ThreadId::from_usize(0));
        thread.is_main = true;
        thread
            .stack
            .push_frame(Interpreter::build_frame(self, start_app.method_id, &receiver)?)?;
        if let Some(constructor) = constructor {
            // a native constructor stub would have no frame to push
            if !self.method_area_read().get_method(&constructor.method_id).is_native() {
                thread
                    .stack
                    .push_frame(Interpreter::build_frame(self, constructor.method_id, &receiver)?)?;
            }
        }
        Interpreter::ensure_initialized(self, &mut thread, class_id)?;
        let id = self.spawn_thread(thread);
        *self.main_thread.write().unwrap() = Some(id);
        Ok(id)
    }

    /// One scheduler tick: pick a thread, grant a quantum, park it back,
    /// reap finished threads.
    pub fn pump_once(&self) -> Result<PumpStatus, VmError> {
        if self.shutdown_requested() {
            return Ok(PumpStatus::Finished);
        }
        let now = self.now();
        let taken = self.scheduler_write().take_next(now);
        let Some(mut thread) = taken else {
            if self.scheduler_read().live_count() == 0 {
                return Ok(PumpStatus::Finished);
            }
            return Ok(PumpStatus::Idle);
        };

        let outcome = Interpreter::execute(self, &mut thread, self.quantum);
        let finished = {
            let mut scheduler = self.scheduler_write();
            scheduler.park(thread);
            scheduler.remove_finished()
        };
        for dead in finished {
            if let Some(exception) = dead.last_exception {
                let description = self.describe_throwable(exception);
                error!("uncaught exception in thread {}: {description}", dead.id.as_usize());
                if Some(dead.id) == *self.main_thread.read().unwrap() {
                    self.set_exit_status(1);
                }
            }
        }
        outcome?;
        Ok(PumpStatus::Executed)
    }

    /// Drive the pump until all user threads terminate or shutdown is
    /// requested; returns the exit status.
    pub fn run(&self) -> Result<i32, VmError> {
        loop {
            match self.pump_once()? {
                PumpStatus::Executed => {}
                PumpStatus::Idle => std::thread::sleep(std::time::Duration::from_millis(1)),
                PumpStatus::Finished => break,
            }
        }
        Ok(self.exit_status())
    }

    /// Human-readable `ClassName: message` for diagnostics.
    pub fn describe_throwable(&self, handle: HeapRef) -> String {
        let class_name = match self.heap_read().class_of(handle) {
            Ok(Some(class_id)) => {
                let ma = self.method_area_read();
                self.interner.resolve(&ma.get_class(&class_id).name).replace('/', ".")
            }
            _ => "<unknown>".to_string(),
        };
        let message = self.throwable_message(handle);
        match message {
            Some(message) if !message.is_empty() => format!("{class_name}: {message}"),
            _ => class_name,
        }
    }

    fn throwable_message(&self, handle: HeapRef) -> Option<String> {
        let class_id = self.heap_read().class_of(handle).ok()??;
        let offset = {
            let ma = self.method_area_read();
            ma.get_class(&class_id).field_offset(&self.br.detail_message_fk)?
        };
        let value = self
            .heap_read()
            .read_field(handle, offset, slot::SlotKind::Reference)
            .ok()?;
        match value {
            Value::Ref(message) => self.read_java_string(message).ok(),
            _ => None,
        }
    }
}
