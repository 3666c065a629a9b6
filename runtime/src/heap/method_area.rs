use crate::class_loader::ClassPath;
use crate::debug_log;
use crate::error::VmError;
use crate::keys::{CallSiteKey, ClassId, FieldKey, MethodId, MethodKey, Symbol};
use crate::rt::constant_pool::RuntimeConstantPool;
use crate::rt::method::{CodeBody, Method};
use crate::rt::LinkedClass;
use crate::vm::bootstrap_registry::BootstrapRegistry;
use cldc_classfile::ClassFile;
use cldc_classfile::flags::ClassFlags;
use cldc_classfile::mutf8;
use dashmap::DashMap;
use lasso::ThreadedRodeo;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of a method resolution walk; also the value memoised per call
/// site for virtual dispatch.
#[derive(Debug, Clone, Copy)]
pub struct CallTarget {
    pub defining_class: ClassId,
    pub method_id: MethodId,
}

/// The class registry and linker. Resolution is idempotent: the first call
/// for a name decodes and links, later calls return the cached binding.
pub struct MethodArea {
    class_loader: ClassPath,
    class_name_to_index: HashMap<Symbol, ClassId>,
    classes: Vec<LinkedClass>,
    methods: Vec<Method>,
    call_site_cache: DashMap<CallSiteKey, CallTarget>,
    interner: Arc<ThreadedRodeo>,
    bootstrap_registry: Arc<BootstrapRegistry>,
    /// Names currently being linked; a repeat entry is a hierarchy cycle.
    loading: Vec<Symbol>,
}

impl MethodArea {
    pub fn init(
        class_loader: ClassPath,
        interner: Arc<ThreadedRodeo>,
    ) -> Result<(Self, Arc<BootstrapRegistry>), VmError> {
        debug_log!("creating method area");
        let bootstrap_registry = Arc::new(BootstrapRegistry::new(&interner));
        let mut method_area = Self {
            class_loader,
            class_name_to_index: HashMap::new(),
            classes: Vec::with_capacity(256),
            methods: Vec::with_capacity(2048),
            call_site_cache: DashMap::new(),
            interner,
            bootstrap_registry: bootstrap_registry.clone(),
            loading: Vec::new(),
        };
        let object_sym = method_area.br().object_sym;
        let object_id = method_area.get_class_id_or_load(object_sym)?;
        method_area.bootstrap_registry.set_object_class_id(object_id)?;
        Ok((method_area, bootstrap_registry))
    }

    pub fn interner(&self) -> &ThreadedRodeo {
        &self.interner
    }

    pub fn br(&self) -> &BootstrapRegistry {
        &self.bootstrap_registry
    }

    pub fn class_loader_mut(&mut self) -> &mut ClassPath {
        &mut self.class_loader
    }

    pub fn get_class(&self, id: &ClassId) -> &LinkedClass {
        &self.classes[id.as_usize()]
    }

    pub fn get_method(&self, id: &MethodId) -> &Method {
        &self.methods[id.as_usize()]
    }

    pub fn get_code(&self, id: &MethodId) -> Result<&CodeBody, VmError> {
        let method = self.get_method(id);
        let class = self.get_class(&method.class_id());
        method.code(&class.cp, self.interner.resolve(&method.name))
    }

    pub fn get_cp_by_method_id(&self, id: &MethodId) -> &RuntimeConstantPool {
        &self.get_class(&self.get_method(id).class_id()).cp
    }

    pub fn pretty_method(&self, id: &MethodId) -> String {
        let method = self.get_method(id);
        let class = self.get_class(&method.class_id());
        format!(
            "{}.{}{}",
            self.interner.resolve(&class.name),
            self.interner.resolve(&method.name),
            self.interner.resolve(&method.desc),
        )
    }

    pub fn lookup(&self, name: Symbol) -> Option<ClassId> {
        self.class_name_to_index.get(&name).copied()
    }

    /// Resolution order: cached binding, application archive, library
    /// archive, synthesised root, synthesised array class, synthesised
    /// bootstrap stub. Descriptor-shaped names are rejected outright.
    pub fn get_class_id_or_load(&mut self, name: Symbol) -> Result<ClassId, VmError> {
        if let Some(id) = self.class_name_to_index.get(&name) {
            return Ok(*id);
        }

        let name_str = self.interner.resolve(&name).to_string();
        if name_str.is_empty()
            || name_str.starts_with('(')
            || (name_str.starts_with('L') && name_str.ends_with(';'))
        {
            return Err(VmError::BadClassName(name_str));
        }
        if self.loading.contains(&name) {
            return Err(VmError::ClassHierarchyCycle(name_str));
        }

        if let Some(bytes) = self.class_loader.find_class(&name_str) {
            let class_file = ClassFile::parse(&bytes)?;
            self.loading.push(name);
            let result = self.link(name, class_file);
            self.loading.pop();
            return result;
        }

        if name == self.br().object_sym {
            return self.synthesize_root();
        }
        if name_str.starts_with('[') {
            return self.synthesize_array_class(name);
        }
        if let Some(id) = self.synthesize_bootstrap(name, &name_str)? {
            return Ok(id);
        }

        Err(VmError::ClassNotFound(name_str))
    }

    fn intern_utf8(&self, class_file: &ClassFile, idx: u16) -> Result<Symbol, VmError> {
        let bytes = class_file
            .cp
            .utf8_bytes(idx)
            .ok_or(VmError::ConstantPool { index: idx, expected: "Utf8" })?;
        Ok(self.interner.get_or_intern(mutf8::to_string(bytes)))
    }

    fn class_name_at(&self, class_file: &ClassFile, idx: u16) -> Result<Symbol, VmError> {
        match class_file.cp.get(idx) {
            Some(cldc_classfile::constant::ConstantInfo::Class(name_idx)) => {
                self.intern_utf8(class_file, *name_idx)
            }
            _ => Err(VmError::ConstantPool { index: idx, expected: "Class" }),
        }
    }

    /// Bind a decoded file to runtime data: superclass chain, interface
    /// list, field offsets (superclass slots first), declared methods.
    fn link(&mut self, name: Symbol, mut class_file: ClassFile) -> Result<ClassId, VmError> {
        let super_id = if class_file.super_class == 0 {
            None
        } else {
            let super_sym = self.class_name_at(&class_file, class_file.super_class)?;
            Some(self.get_class_id_or_load(super_sym)?)
        };

        let interface_indices = std::mem::take(&mut class_file.interfaces);
        let mut interfaces = Vec::with_capacity(interface_indices.len());
        for idx in interface_indices {
            let interface_sym = self.class_name_at(&class_file, idx)?;
            interfaces.push(self.get_class_id_or_load(interface_sym)?);
        }

        let (mut field_offsets, mut next_slot) = match super_id {
            Some(id) => {
                let superclass = self.get_class(&id);
                (superclass.field_offsets().clone(), superclass.instance_slots())
            }
            None => (HashMap::new(), 0),
        };
        let mut statics = HashMap::new();
        for field in &class_file.fields {
            let key = FieldKey {
                name: self.intern_utf8(&class_file, field.name_index)?,
                desc: self.intern_utf8(&class_file, field.descriptor_index)?,
            };
            if field.access_flags.is_static() {
                statics.insert(key, 0u64);
            } else {
                field_offsets.insert(key, next_slot);
                next_slot += 1;
            }
        }

        let this_id = ClassId::from_usize(self.classes.len());
        let clinit_sym = self.br().clinit_sym;
        let mut methods = HashMap::new();
        let mut clinit = None;
        let method_infos = std::mem::take(&mut class_file.methods);
        for info in method_infos {
            let method_name = self.intern_utf8(&class_file, info.name_index)?;
            let method_desc = self.intern_utf8(&class_file, info.descriptor_index)?;
            let desc_str = self.interner.resolve(&method_desc).to_string();
            let method = Method::from_info(
                info,
                this_id,
                method_name,
                method_desc,
                &desc_str,
                &class_file.cp,
            )?;
            let method_id = MethodId::from_usize(self.methods.len());
            self.methods.push(method);
            if method_name == clinit_sym {
                clinit = Some(method_id);
            } else {
                methods.insert(MethodKey { name: method_name, desc: method_desc }, method_id);
            }
        }

        let mut source_file = None;
        for attr in &class_file.attributes {
            if class_file.cp.utf8_bytes(attr.name_index) == Some(b"SourceFile".as_slice())
                && attr.info.len() == 2
            {
                let idx = u16::from_be_bytes([attr.info[0], attr.info[1]]);
                source_file = self.intern_utf8(&class_file, idx).ok();
                break;
            }
        }

        let class = LinkedClass::new(
            name,
            class_file.access_flags,
            super_id,
            interfaces,
            RuntimeConstantPool::new(class_file.cp),
            methods,
            clinit,
            field_offsets,
            next_slot,
            statics,
            source_file,
        );
        self.classes.push(class);
        self.class_name_to_index.insert(name, this_id);
        if name == self.br().string_sym {
            let _ = self.bootstrap_registry.set_string_class_id(this_id);
        }
        debug_log!("linked class \"{}\"", self.interner.resolve(&name));
        Ok(this_id)
    }

    /// Install a host-synthesised class: fields get slot offsets appended
    /// after the superclass's, methods are native-marked stubs. Used by the
    /// bootstrap mocks and available to embedders for the same purpose.
    pub fn register_class(
        &mut self,
        name: &str,
        super_name: Option<&str>,
        instance_fields: &[(&str, &str)],
        native_methods: &[(&str, &str, bool)],
    ) -> Result<ClassId, VmError> {
        let name_sym = self.interner.get_or_intern(name);
        let super_id = match super_name {
            Some(super_name) => {
                let super_sym = self.interner.get_or_intern(super_name);
                Some(self.get_class_id_or_load(super_sym)?)
            }
            None => None,
        };

        let (mut field_offsets, mut next_slot) = match super_id {
            Some(id) => {
                let superclass = self.get_class(&id);
                (superclass.field_offsets().clone(), superclass.instance_slots())
            }
            None => (HashMap::new(), 0),
        };
        for &(field_name, field_desc) in instance_fields {
            let key = FieldKey {
                name: self.interner.get_or_intern(field_name),
                desc: self.interner.get_or_intern(field_desc),
            };
            field_offsets.insert(key, next_slot);
            next_slot += 1;
        }

        let this_id = ClassId::from_usize(self.classes.len());
        let mut methods = HashMap::new();
        for &(method_name, method_desc, is_static) in native_methods {
            let name_sym = self.interner.get_or_intern(method_name);
            let desc_sym = self.interner.get_or_intern(method_desc);
            let method = Method::native_stub(this_id, name_sym, desc_sym, method_desc, is_static)?;
            let method_id = MethodId::from_usize(self.methods.len());
            self.methods.push(method);
            methods.insert(MethodKey { name: name_sym, desc: desc_sym }, method_id);
        }

        let class = LinkedClass::new(
            name_sym,
            ClassFlags::new(0x0021),
            super_id,
            Vec::new(),
            RuntimeConstantPool::empty(),
            methods,
            None,
            field_offsets,
            next_slot,
            HashMap::new(),
            None,
        );
        self.classes.push(class);
        self.class_name_to_index.insert(name_sym, this_id);
        if name_sym == self.br().string_sym {
            let _ = self.bootstrap_registry.set_string_class_id(this_id);
        }
        debug_log!("synthesised class \"{name}\"");
        Ok(this_id)
    }

    /// The designated root class, when no archive provides it: zero fields,
    /// native stubs for the Object protocol.
    fn synthesize_root(&mut self) -> Result<ClassId, VmError> {
        self.register_class(
            "java/lang/Object",
            None,
            &[],
            &[
                ("<init>", "()V", false),
                ("hashCode", "()I", false),
                ("equals", "(Ljava/lang/Object;)Z", false),
                ("getClass", "()Ljava/lang/Class;", false),
                ("toString", "()Ljava/lang/String;", false),
                ("wait", "()V", false),
                ("wait", "(J)V", false),
                ("notify", "()V", false),
                ("notifyAll", "()V", false),
            ],
        )
    }

    /// Array classes have no declared fields; they exist so constant-pool
    /// class references like `[I` or `[Ljava/lang/String;` resolve.
    fn synthesize_array_class(&mut self, name: Symbol) -> Result<ClassId, VmError> {
        let name_str = self.interner.resolve(&name).to_string();
        self.register_class(&name_str, Some("java/lang/Object"), &[], &[])
    }

    /// The fixed list of bootstrap classes whose storage layout is dictated
    /// by native code. Archives take precedence; these only fill gaps.
    fn synthesize_bootstrap(&mut self, _name: Symbol, name_str: &str) -> Result<Option<ClassId>, VmError> {
        let id = match name_str {
            "java/lang/String" => self.register_class(
                name_str,
                Some("java/lang/Object"),
                &[("value", "[C"), ("offset", "I"), ("count", "I")],
                &[
                    ("<init>", "()V", false),
                    ("<init>", "([C)V", false),
                    ("<init>", "([B)V", false),
                    ("length", "()I", false),
                    ("charAt", "(I)C", false),
                    ("getBytes", "()[B", false),
                    ("toString", "()Ljava/lang/String;", false),
                    ("equals", "(Ljava/lang/Object;)Z", false),
                    ("hashCode", "()I", false),
                ],
            )?,
            "java/lang/StringBuffer" | "java/lang/StringBuilder" => {
                let self_desc = format!("L{name_str};");
                let append = |arg: &str| format!("({arg}){self_desc}");
                self.register_class(
                    name_str,
                    Some("java/lang/Object"),
                    &[("value", "[C"), ("count", "I")],
                    &[
                        ("<init>", "()V", false),
                        ("<init>", "(I)V", false),
                        ("<init>", "(Ljava/lang/String;)V", false),
                        ("append", &append("Ljava/lang/String;"), false),
                        ("append", &append("Ljava/lang/Object;"), false),
                        ("append", &append("I"), false),
                        ("append", &append("J"), false),
                        ("append", &append("C"), false),
                        ("append", &append("Z"), false),
                        ("toString", "()Ljava/lang/String;", false),
                        ("length", "()I", false),
                    ],
                )?
            }
            "java/io/InputStream" => self.register_class(
                name_str,
                Some("java/lang/Object"),
                &[("handle", "I")],
                &[
                    ("read", "()I", false),
                    ("read", "([B)I", false),
                    ("read", "([BII)I", false),
                    ("available", "()I", false),
                    ("skip", "(J)J", false),
                    ("close", "()V", false),
                    ("mark", "(I)V", false),
                    ("reset", "()V", false),
                    ("markSupported", "()Z", false),
                ],
            )?,
            "java/lang/Class" => self.register_class(
                name_str,
                Some("java/lang/Object"),
                &[("name", "Ljava/lang/String;")],
                &[
                    ("getName", "()Ljava/lang/String;", false),
                    (
                        "getResourceAsStream",
                        "(Ljava/lang/String;)Ljava/io/InputStream;",
                        false,
                    ),
                ],
            )?,
            "java/lang/System" => self.register_class(
                name_str,
                Some("java/lang/Object"),
                &[],
                &[
                    ("currentTimeMillis", "()J", true),
                    ("arraycopy", "(Ljava/lang/Object;ILjava/lang/Object;II)V", true),
                    ("exit", "(I)V", true),
                    ("identityHashCode", "(Ljava/lang/Object;)I", true),
                    ("gc", "()V", true),
                ],
            )?,
            "java/lang/Thread" => self.register_class(
                name_str,
                Some("java/lang/Object"),
                &[("target", "Ljava/lang/Runnable;"), ("name", "Ljava/lang/String;")],
                &[
                    ("<init>", "()V", false),
                    ("<init>", "(Ljava/lang/Runnable;)V", false),
                    ("start", "()V", false),
                    ("join", "()V", false),
                    ("isAlive", "()Z", false),
                    ("setPriority", "(I)V", false),
                    ("sleep", "(J)V", true),
                    ("yield", "()V", true),
                    ("currentThread", "()Ljava/lang/Thread;", true),
                ],
            )?,
            "java/lang/Runnable" => {
                self.register_class(name_str, Some("java/lang/Object"), &[], &[])?
            }
            "java/lang/Math" => self.register_class(
                name_str,
                Some("java/lang/Object"),
                &[],
                &[
                    ("sqrt", "(D)D", true),
                    ("sin", "(D)D", true),
                    ("cos", "(D)D", true),
                    ("tan", "(D)D", true),
                    ("floor", "(D)D", true),
                    ("ceil", "(D)D", true),
                ],
            )?,
            "java/lang/Float" => self.register_class(
                name_str,
                Some("java/lang/Object"),
                &[],
                &[
                    ("floatToIntBits", "(F)I", true),
                    ("intBitsToFloat", "(I)F", true),
                ],
            )?,
            "java/lang/Double" => self.register_class(
                name_str,
                Some("java/lang/Object"),
                &[],
                &[
                    ("doubleToLongBits", "(D)J", true),
                    ("longBitsToDouble", "(J)D", true),
                ],
            )?,
            "javax/microedition/midlet/MIDlet" => self.register_class(
                name_str,
                Some("java/lang/Object"),
                &[],
                &[
                    ("<init>", "()V", false),
                    ("notifyDestroyed", "()V", false),
                    ("notifyPaused", "()V", false),
                ],
            )?,
            "javax/microedition/media/Player" => self.register_class(
                name_str,
                Some("java/lang/Object"),
                &[],
                &[
                    ("start", "()V", false),
                    ("stop", "()V", false),
                    ("close", "()V", false),
                    ("prefetch", "()V", false),
                    ("realize", "()V", false),
                    ("deallocate", "()V", false),
                    ("setLoopCount", "(I)V", false),
                    ("getState", "()I", false),
                ],
            )?,
            "java/lang/Throwable" => self.register_class(
                name_str,
                Some("java/lang/Object"),
                &[("detailMessage", "Ljava/lang/String;")],
                &[
                    ("<init>", "()V", false),
                    ("<init>", "(Ljava/lang/String;)V", false),
                    ("getMessage", "()Ljava/lang/String;", false),
                    ("toString", "()Ljava/lang/String;", false),
                    ("printStackTrace", "()V", false),
                ],
            )?,
            _ => match throwable_super(name_str) {
                Some(super_name) => self.register_class(name_str, Some(super_name), &[], &[])?,
                None => return Ok(None),
            },
        };
        Ok(Some(id))
    }

    /// `isAssignable` walk: superclass chain plus interfaces; the root class
    /// is an ancestor of every reference.
    pub fn instance_of(&self, class_id: ClassId, target: Symbol) -> bool {
        if target == self.br().object_sym {
            return true;
        }
        let mut current = Some(class_id);
        while let Some(id) = current {
            let class = self.get_class(&id);
            if class.name == target {
                return true;
            }
            for interface in class.interfaces() {
                if self.instance_of(*interface, target) {
                    return true;
                }
            }
            current = class.super_id();
        }
        false
    }

    pub fn is_ancestor(&self, ancestor: ClassId, descendant: ClassId) -> bool {
        let mut current = Some(descendant);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get_class(&id).super_id();
        }
        false
    }

    /// Linear walk up the superclass chain for `name+descriptor`.
    pub fn find_in_chain(&self, start: ClassId, key: &MethodKey) -> Option<CallTarget> {
        let mut current = Some(start);
        while let Some(id) = current {
            let class = self.get_class(&id);
            if let Some(method_id) = class.method_id(key) {
                return Some(CallTarget { defining_class: id, method_id });
            }
            current = class.super_id();
        }
        None
    }

    /// Virtual dispatch on the receiver's runtime class, memoised per call
    /// site. A hit is only reused after confirming the cached defining class
    /// is still an ancestor of the receiver's class.
    pub fn find_virtual(
        &self,
        declared_class: Symbol,
        receiver_class: ClassId,
        key: MethodKey,
    ) -> Result<CallTarget, VmError> {
        let cache_key = CallSiteKey {
            class: declared_class,
            name: key.name,
            desc: key.desc,
        };
        if let Some(target) = self.call_site_cache.get(&cache_key)
            && self.is_ancestor(target.defining_class, receiver_class)
        {
            return Ok(*target);
        }
        let target = self.find_in_chain(receiver_class, &key).ok_or(crate::build_exception!(
            NoSuchMethodError,
            method_key: key,
            class_sym: self.get_class(&receiver_class).name
        ))?;
        self.call_site_cache.insert(cache_key, target);
        Ok(target)
    }

    /// invokespecial / invokestatic resolution on the declared class.
    pub fn find_declared(&self, class_id: ClassId, key: MethodKey) -> Result<CallTarget, VmError> {
        self.find_in_chain(class_id, &key).ok_or(crate::build_exception!(
            NoSuchMethodError,
            method_key: key,
            class_sym: self.get_class(&class_id).name
        ))
    }

    /// Static fields are looked up on the class where they are declared,
    /// never inherited in storage.
    pub fn resolve_static_field_class(&self, start: ClassId, key: &FieldKey) -> Option<ClassId> {
        let mut current = Some(start);
        while let Some(id) = current {
            let class = self.get_class(&id);
            if class.has_static(key) {
                return Some(id);
            }
            current = class.super_id();
        }
        None
    }

    /// Instance field offset, searching the chain of declaring classes.
    /// The offset table already contains inherited fields, so the declared
    /// class's table answers directly.
    pub fn resolve_field_offset(&self, class_id: ClassId, key: &FieldKey) -> Option<usize> {
        self.get_class(&class_id).field_offset(key)
    }
}

/// Superclass of each synthesised throwable, for catch-type matching.
fn throwable_super(name: &str) -> Option<&'static str> {
    match name {
        "java/lang/Exception" | "java/lang/Error" => Some("java/lang/Throwable"),
        "java/lang/RuntimeException" => Some("java/lang/Exception"),
        "java/lang/ArithmeticException"
        | "java/lang/NullPointerException"
        | "java/lang/ClassCastException"
        | "java/lang/IndexOutOfBoundsException"
        | "java/lang/IllegalArgumentException"
        | "java/lang/IllegalStateException"
        | "java/lang/NegativeArraySizeException" => Some("java/lang/RuntimeException"),
        "java/lang/ArrayIndexOutOfBoundsException" => Some("java/lang/IndexOutOfBoundsException"),
        "java/lang/InterruptedException" => Some("java/lang/Exception"),
        "java/io/IOException" => Some("java/lang/Exception"),
        "java/lang/UnsatisfiedLinkError"
        | "java/lang/NoSuchMethodError"
        | "java/lang/NoSuchFieldError"
        | "java/lang/InternalError"
        | "java/lang/OutOfMemoryError" => Some("java/lang/Error"),
        _ => None,
    }
}
