//! CLAP export macro and entry point generation.

/// Generate the `clap_entry` symbol for a plugin.
///
/// The host dlopens the bundle, resolves `clap_entry`, and walks entry →
/// factory → descriptor → `create_plugin`. This macro emits all of that
/// plumbing for one processor type; the factory itself lives in a lazily
/// initialized static so descriptor strings are built once per process.
///
/// # Arguments
///
/// * `$config` - a `static` [`Config`](gantry_core::Config) with the plugin
///   metadata and engine policy
/// * `$plugin` - the processor type implementing
///   [`Processor`](gantry_core::Processor) + `Default`
///
/// # Example
///
/// ```rust,ignore
/// use gantry_clap::export_clap;
/// use gantry_core::{Config, PluginKind};
///
/// static CONFIG: Config = Config::new("Gantry Gain", "media.helper.gantry.gain")
///     .with_vendor("Helper Media")
///     .with_version(env!("CARGO_PKG_VERSION"))
///     .with_kind(PluginKind::AudioEffect);
///
/// export_clap!(CONFIG, GainProcessor);
/// ```
#[macro_export]
macro_rules! export_clap {
    ($config:expr, $plugin:ty) => {
        #[doc(hidden)]
        mod __gantry_clap_entry {
            use super::*;

            static FACTORY: ::std::sync::OnceLock<$crate::factory::Factory<$plugin>> =
                ::std::sync::OnceLock::new();

            fn factory() -> &'static $crate::factory::Factory<$plugin> {
                FACTORY.get_or_init(|| $crate::factory::Factory::new(&$config))
            }

            unsafe extern "C" fn get_plugin_count(
                _factory: *const $crate::clap_sys::factory::plugin_factory::clap_plugin_factory,
            ) -> u32 {
                factory().plugin_count()
            }

            unsafe extern "C" fn get_plugin_descriptor(
                _factory: *const $crate::clap_sys::factory::plugin_factory::clap_plugin_factory,
                index: u32,
            ) -> *const $crate::clap_sys::plugin::clap_plugin_descriptor {
                factory().descriptor(index)
            }

            unsafe extern "C" fn create_plugin(
                _factory: *const $crate::clap_sys::factory::plugin_factory::clap_plugin_factory,
                host: *const $crate::clap_sys::host::clap_host,
                plugin_id: *const ::std::ffi::c_char,
            ) -> *const $crate::clap_sys::plugin::clap_plugin {
                // SAFETY: Host and ID validity are the host's obligations
                // under the factory contract; `factory()` returns a static.
                unsafe { factory().create(host, plugin_id) }
            }

            static CLAP_FACTORY:
                $crate::clap_sys::factory::plugin_factory::clap_plugin_factory =
                $crate::clap_sys::factory::plugin_factory::clap_plugin_factory {
                    get_plugin_count: Some(get_plugin_count),
                    get_plugin_descriptor: Some(get_plugin_descriptor),
                    create_plugin: Some(create_plugin),
                };

            unsafe extern "C" fn entry_init(_plugin_path: *const ::std::ffi::c_char) -> bool {
                true
            }

            unsafe extern "C" fn entry_deinit() {}

            unsafe extern "C" fn entry_get_factory(
                factory_id: *const ::std::ffi::c_char,
            ) -> *const ::std::ffi::c_void {
                if factory_id.is_null() {
                    return ::std::ptr::null();
                }
                // SAFETY: The host passes a NUL-terminated factory ID.
                let id = unsafe { ::std::ffi::CStr::from_ptr(factory_id) };
                if id == $crate::clap_sys::factory::plugin_factory::CLAP_PLUGIN_FACTORY_ID {
                    &CLAP_FACTORY as *const _ as *const ::std::ffi::c_void
                } else {
                    ::std::ptr::null()
                }
            }

            #[allow(non_upper_case_globals)]
            #[no_mangle]
            pub static clap_entry: $crate::clap_sys::entry::clap_plugin_entry =
                $crate::clap_sys::entry::clap_plugin_entry {
                    clap_version: $crate::clap_sys::version::CLAP_VERSION,
                    init: Some(entry_init),
                    deinit: Some(entry_deinit),
                    get_factory: Some(entry_get_factory),
                };
        }
    };
}
