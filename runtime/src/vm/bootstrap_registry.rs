use crate::error::VmError;
use crate::keys::{ClassId, FieldKey, MethodKey, Symbol};
use lasso::ThreadedRodeo;
use once_cell::sync::OnceCell;

/// Pre-interned names, keys and descriptors the runtime touches on hot
/// paths, plus cached ids of the core classes.
pub struct BootstrapRegistry {
    // Method keys
    pub clinit_mk: MethodKey,
    pub no_arg_constructor_mk: MethodKey,
    pub main_mk: MethodKey,
    pub run_mk: MethodKey,
    pub start_app_mk: MethodKey,

    // Field keys
    pub string_value_fk: FieldKey,
    pub string_offset_fk: FieldKey,
    pub string_count_fk: FieldKey,
    pub buffer_value_fk: FieldKey,
    pub buffer_count_fk: FieldKey,
    pub stream_handle_fk: FieldKey,
    pub class_name_fk: FieldKey,
    pub thread_target_fk: FieldKey,
    pub detail_message_fk: FieldKey,

    // Class names (interned)
    pub object_sym: Symbol,
    pub class_sym: Symbol,
    pub string_sym: Symbol,
    pub string_buffer_sym: Symbol,
    pub string_builder_sym: Symbol,
    pub input_stream_sym: Symbol,
    pub system_sym: Symbol,
    pub thread_sym: Symbol,
    pub runnable_sym: Symbol,
    pub throwable_sym: Symbol,
    pub exception_sym: Symbol,
    pub runtime_exception_sym: Symbol,
    pub error_sym: Symbol,
    pub math_sym: Symbol,
    pub float_sym: Symbol,
    pub double_sym: Symbol,
    pub media_player_sym: Symbol,

    // Method names
    pub init_sym: Symbol,
    pub clinit_sym: Symbol,
    pub main_sym: Symbol,
    pub run_sym: Symbol,

    // Descriptors
    pub void_desc: Symbol,
    pub string_desc: Symbol,
    pub char_array_desc: Symbol,
    pub int_desc: Symbol,

    // Core class ids, filled as the classes are first resolved
    object_class_id: OnceCell<ClassId>,
    string_class_id: OnceCell<ClassId>,
}

impl BootstrapRegistry {
    pub fn new(interner: &ThreadedRodeo) -> Self {
        let init_sym = interner.get_or_intern("<init>");
        let clinit_sym = interner.get_or_intern("<clinit>");
        let main_sym = interner.get_or_intern("main");
        let run_sym = interner.get_or_intern("run");

        let void_desc = interner.get_or_intern("()V");
        let string_desc = interner.get_or_intern("Ljava/lang/String;");
        let char_array_desc = interner.get_or_intern("[C");
        let int_desc = interner.get_or_intern("I");

        Self {
            clinit_mk: MethodKey { name: clinit_sym, desc: void_desc },
            no_arg_constructor_mk: MethodKey { name: init_sym, desc: void_desc },
            main_mk: MethodKey {
                name: main_sym,
                desc: interner.get_or_intern("([Ljava/lang/String;)V"),
            },
            run_mk: MethodKey { name: run_sym, desc: void_desc },
            start_app_mk: MethodKey {
                name: interner.get_or_intern("startApp"),
                desc: void_desc,
            },

            string_value_fk: FieldKey {
                name: interner.get_or_intern("value"),
                desc: char_array_desc,
            },
            string_offset_fk: FieldKey {
                name: interner.get_or_intern("offset"),
                desc: int_desc,
            },
            string_count_fk: FieldKey {
                name: interner.get_or_intern("count"),
                desc: int_desc,
            },
            buffer_value_fk: FieldKey {
                name: interner.get_or_intern("value"),
                desc: char_array_desc,
            },
            buffer_count_fk: FieldKey {
                name: interner.get_or_intern("count"),
                desc: int_desc,
            },
            stream_handle_fk: FieldKey {
                name: interner.get_or_intern("handle"),
                desc: int_desc,
            },
            class_name_fk: FieldKey {
                name: interner.get_or_intern("name"),
                desc: string_desc,
            },
            thread_target_fk: FieldKey {
                name: interner.get_or_intern("target"),
                desc: interner.get_or_intern("Ljava/lang/Runnable;"),
            },
            detail_message_fk: FieldKey {
                name: interner.get_or_intern("detailMessage"),
                desc: string_desc,
            },

            object_sym: interner.get_or_intern("java/lang/Object"),
            class_sym: interner.get_or_intern("java/lang/Class"),
            string_sym: interner.get_or_intern("java/lang/String"),
            string_buffer_sym: interner.get_or_intern("java/lang/StringBuffer"),
            string_builder_sym: interner.get_or_intern("java/lang/StringBuilder"),
            input_stream_sym: interner.get_or_intern("java/io/InputStream"),
            system_sym: interner.get_or_intern("java/lang/System"),
            thread_sym: interner.get_or_intern("java/lang/Thread"),
            runnable_sym: interner.get_or_intern("java/lang/Runnable"),
            throwable_sym: interner.get_or_intern("java/lang/Throwable"),
            exception_sym: interner.get_or_intern("java/lang/Exception"),
            runtime_exception_sym: interner.get_or_intern("java/lang/RuntimeException"),
            error_sym: interner.get_or_intern("java/lang/Error"),
            math_sym: interner.get_or_intern("java/lang/Math"),
            float_sym: interner.get_or_intern("java/lang/Float"),
            double_sym: interner.get_or_intern("java/lang/Double"),
            media_player_sym: interner.get_or_intern("javax/microedition/media/Player"),

            init_sym,
            clinit_sym,
            main_sym,
            run_sym,

            void_desc,
            string_desc,
            char_array_desc,
            int_desc,

            object_class_id: OnceCell::new(),
            string_class_id: OnceCell::new(),
        }
    }

    pub fn set_object_class_id(&self, class_id: ClassId) -> Result<(), VmError> {
        self.object_class_id
            .set(class_id)
            .map_err(|_| VmError::HostFatal("java/lang/Object id already set".to_string()))
    }

    pub fn get_object_class_id(&self) -> Result<ClassId, VmError> {
        self.object_class_id
            .get()
            .copied()
            .ok_or_else(|| VmError::HostFatal("java/lang/Object is not loaded".to_string()))
    }

    pub fn set_string_class_id(&self, class_id: ClassId) -> Result<(), VmError> {
        self.string_class_id
            .set(class_id)
            .map_err(|_| VmError::HostFatal("java/lang/String id already set".to_string()))
    }

    pub fn get_string_class_id(&self) -> Option<ClassId> {
        self.string_class_id.get().copied()
    }
}
