// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::panic::PanicHookInfo;
use std::sync::Arc;

use crashlog::abort::AbortController;

/// Routes Rust panics into the assertion path of `controller`: the panic
/// message becomes the expression, the source file the function.
pub fn install_panic_hook(controller: Arc<AbortController>) {
    std::panic::set_hook(Box::new(move |info| {
        let message = panic_message(info);
        let (file, line) = info
            .location()
            .map_or_else(|| ("N/A".to_string(), 0), |l| (l.file().to_string(), l.line()));
        controller.on_assertion_failure(&message, &file, line)
    }));
}

fn panic_message(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "N/A".to_string()
    }
}
