/// Declares always-available exported functions whose bodies run under
/// [`guard`](crate::error::guard).
///
/// ```ignore
/// exports! {
///     fn getPrimitiveCount(context: *const Context) -> usize = 0 => {
///         Ok(context_ref(context)?.primitive_count())
///     }
/// }
/// ```
macro_rules! exports {
    ($(
        $(#[$meta:meta])*
        fn $name:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty = $sentinel:expr => $body:block
    )*) => {
        $(
            $(#[$meta])*
            #[unsafe(no_mangle)]
            pub extern "C" fn $name($($arg: $ty),*) -> $ret {
                $crate::error::guard(
                    stringify!($name),
                    $sentinel,
                    || -> ::std::result::Result<$ret, $crate::error::FfiError> { $body },
                )
            }
        )*
    };
}

/// Declares the exported functions of a feature-gated plugin group. With the
/// feature off every symbol is still exported, records
/// [`FeatureUnavailable`](crate::error::ErrorCode::FeatureUnavailable) and
/// returns its sentinel without reading any argument.
macro_rules! plugin_exports {
    ($feature:tt; $(
        $(#[$meta:meta])*
        fn $name:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty = $sentinel:expr => $body:block
    )*) => {
        $(
            $(#[$meta])*
            #[cfg(feature = $feature)]
            #[unsafe(no_mangle)]
            pub extern "C" fn $name($($arg: $ty),*) -> $ret {
                $crate::error::guard(
                    stringify!($name),
                    $sentinel,
                    || -> ::std::result::Result<$ret, $crate::error::FfiError> { $body },
                )
            }

            $(#[$meta])*
            #[cfg(not(feature = $feature))]
            #[unsafe(no_mangle)]
            pub extern "C" fn $name($($arg: $ty),*) -> $ret {
                let _ = ($($arg,)*);
                $crate::error::record_unavailable($feature, stringify!($name));
                $sentinel
            }
        )*
    };
}

/// Opaque handle type of a plugin group: the real handle with the feature on,
/// an uninhabited placeholder with it off.
macro_rules! plugin_handle {
    ($feature:tt, $(#[$meta:meta])* $name:ident = $real:ty) => {
        $(#[$meta])*
        #[cfg(feature = $feature)]
        pub type $name = $real;

        $(#[$meta])*
        #[cfg(not(feature = $feature))]
        pub enum $name {}
    };
}
