//! FFI bindings for Posture Flux
//!
//! This module provides C-compatible functions for driving the tracker from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `pflux_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::pipeline::{replay_to_summary, PostureProcessor};
use crate::tracker::{now_ms, ResetScope};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// A NULL pointer selects the default configuration
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<TrackerConfig, TrackerError> {
    if config_json.is_null() {
        return Ok(TrackerConfig::default());
    }
    match cstr_to_string(config_json) {
        Some(json) => TrackerConfig::from_json(&json),
        None => Err(TrackerError::InvalidConfig(
            "config is not valid UTF-8".to_string(),
        )),
    }
}

/// Return the string as a C string, or record the error and return NULL
fn result_to_cstr(result: Result<String, TrackerError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay NDJSON sample records and return the session summary JSON.
///
/// # Safety
/// - `ndjson` must be a valid null-terminated C string.
/// - `config_json` must be a valid null-terminated C string or NULL for defaults.
/// - Returns a newly allocated string that must be freed with `pflux_free_string`.
/// - Returns NULL on error; call `pflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pflux_replay_to_summary(
    ndjson: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let records = match cstr_to_string(ndjson) {
        Some(s) => s,
        None => {
            set_last_error("Invalid NDJSON string pointer");
            return ptr::null_mut();
        }
    };

    let config = match config_from_ptr(config_json) {
        Ok(config) => config,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    result_to_cstr(replay_to_summary(&records, config))
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a PostureProcessor
pub struct PostureProcessorHandle {
    processor: PostureProcessor,
}

/// Create a new processor whose session starts now.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or NULL for defaults.
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `pflux_processor_free`.
/// - Returns NULL on error; call `pflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pflux_processor_new(
    config_json: *const c_char,
) -> *mut PostureProcessorHandle {
    clear_last_error();

    let processor = match config_from_ptr(config_json).and_then(PostureProcessor::new) {
        Ok(processor) => processor,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    Box::into_raw(Box::new(PostureProcessorHandle { processor }))
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pflux_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pflux_processor_free(processor: *mut PostureProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Process one sample record and return the status update JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pflux_processor_new`.
/// - `record_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `pflux_free_string`.
/// - Returns NULL on error; call `pflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pflux_processor_process(
    processor: *mut PostureProcessorHandle,
    record_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let record = match cstr_to_string(record_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid record string pointer");
            return ptr::null_mut();
        }
    };

    result_to_cstr(handle.processor.process(&record))
}

/// Current session statistics as JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pflux_processor_new`.
/// - Returns a newly allocated string that must be freed with `pflux_free_string`.
/// - Returns NULL on error; call `pflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pflux_processor_stats(
    processor: *const PostureProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    result_to_cstr((*processor).processor.stats_json())
}

/// Session summary JSON as of `ended_at_ms` (a value <= 0 means now).
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pflux_processor_new`.
/// - Returns a newly allocated string that must be freed with `pflux_free_string`.
/// - Returns NULL on error; call `pflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pflux_processor_summary(
    processor: *const PostureProcessorHandle,
    ended_at_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let ended = if ended_at_ms <= 0 { now_ms() } else { ended_at_ms };
    result_to_cstr((*processor).processor.summary_json(ended))
}

/// Reset the processor's tracker. `full` != 0 also clears the session counters.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pflux_processor_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn pflux_processor_reset(
    processor: *mut PostureProcessorHandle,
    full: i32,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let scope = if full != 0 {
        ResetScope::Full
    } else {
        ResetScope::Soft
    };
    (*processor).processor.reset(scope);
    0
}

/// Save processor state to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pflux_processor_new`.
/// - Returns a newly allocated string that must be freed with `pflux_free_string`.
/// - Returns NULL on error; call `pflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pflux_processor_save_state(
    processor: *const PostureProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    result_to_cstr((*processor).processor.save_state())
}

/// Load processor state from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pflux_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `pflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pflux_processor_load_state(
    processor: *mut PostureProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_state(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pflux_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Flux function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn pflux_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Flux library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pflux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
