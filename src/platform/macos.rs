//! macOS sources: Accessibility (AX) for windows and focus, CoreGraphics for
//! displays, CFBundle for bundle identifiers.
//!
//! AX and CG share the same global coordinate space (top-left origin of the
//! main display), so window positions map directly onto display bounds.

use super::FocusSource;
use crate::error::ResolveError;
use crate::resolve::display::{Display, DisplayId, DisplaySource, Rect};
use crate::resolve::window::{WindowInfo, WindowSource};
use core_foundation::base::TCFType;
use core_foundation::boolean::CFBoolean;
use core_foundation::bundle::CFBundle;
use core_foundation::dictionary::CFDictionary;
use core_foundation::string::CFString;
use core_foundation::url::CFURL;
use core_foundation_sys::array::{CFArrayGetCount, CFArrayGetValueAtIndex, CFArrayRef};
use core_foundation_sys::base::{CFGetTypeID, CFRelease, CFTypeRef};
use core_foundation_sys::bundle::CFBundleGetIdentifier;
use core_foundation_sys::dictionary::CFDictionaryRef;
use core_foundation_sys::string::{CFStringGetTypeID, CFStringRef};
use core_graphics::display::CGDisplay;
use core_graphics::geometry::{CGPoint, CGSize};
use std::ffi::c_void;
use std::path::Path;
use std::ptr::null;
use tracing::{debug, info};

type AXUIElementRef = CFTypeRef;

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> bool;
    fn AXUIElementCreateApplication(pid: i32) -> AXUIElementRef;
    fn AXUIElementCreateSystemWide() -> AXUIElementRef;
    fn AXUIElementCopyAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: *mut CFTypeRef,
    ) -> i32;
    fn AXUIElementGetPid(element: AXUIElementRef, pid: *mut i32) -> i32;
    fn AXValueGetValue(value: CFTypeRef, value_type: u32, out: *mut c_void) -> bool;
}

// AXError codes
const K_AX_ERROR_SUCCESS: i32 = 0;
const K_AX_ERROR_FAILURE: i32 = -25200;
const K_AX_ERROR_API_DISABLED: i32 = -25211;
const K_AX_ERROR_NO_VALUE: i32 = -25212;

// AXValueType
const K_AX_VALUE_CG_POINT_TYPE: u32 = 1;
const K_AX_VALUE_CG_SIZE_TYPE: u32 = 2;

const K_AX_WINDOWS_ATTRIBUTE: &str = "AXWindows";
const K_AX_POSITION_ATTRIBUTE: &str = "AXPosition";
const K_AX_SIZE_ATTRIBUTE: &str = "AXSize";
const K_AX_TITLE_ATTRIBUTE: &str = "AXTitle";
const K_AX_FOCUSED_APPLICATION_ATTRIBUTE: &str = "AXFocusedApplication";

/// A CF object we own (create/copy rule). Released on drop.
struct Owned(CFTypeRef);

impl Owned {
    fn new(raw: CFTypeRef) -> Option<Self> {
        (!raw.is_null()).then_some(Self(raw))
    }
}

impl Drop for Owned {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0) };
    }
}

fn copy_attribute(element: AXUIElementRef, name: &str) -> Result<Owned, i32> {
    let attribute = CFString::new(name);
    let mut value: CFTypeRef = null();
    let code = unsafe {
        AXUIElementCopyAttributeValue(element, attribute.as_concrete_TypeRef(), &mut value)
    };
    if code != K_AX_ERROR_SUCCESS {
        return Err(code);
    }
    Owned::new(value).ok_or(K_AX_ERROR_NO_VALUE)
}

fn ax_value<T>(element: AXUIElementRef, name: &str, value_type: u32, mut out: T) -> Option<T> {
    let value = copy_attribute(element, name).ok()?;
    let ok = unsafe { AXValueGetValue(value.0, value_type, &mut out as *mut T as *mut c_void) };
    ok.then_some(out)
}

fn string_attribute(element: AXUIElementRef, name: &str) -> Option<String> {
    let value = copy_attribute(element, name).ok()?;
    if unsafe { CFGetTypeID(value.0) != CFStringGetTypeID() } {
        return None;
    }
    let s = unsafe { CFString::wrap_under_get_rule(value.0 as CFStringRef) }.to_string();
    (!s.is_empty()).then_some(s)
}

fn window_frame(window: AXUIElementRef) -> Option<Rect> {
    let origin = ax_value(window, K_AX_POSITION_ATTRIBUTE, K_AX_VALUE_CG_POINT_TYPE, CGPoint::new(0.0, 0.0))?;
    let size = ax_value(window, K_AX_SIZE_ATTRIBUTE, K_AX_VALUE_CG_SIZE_TYPE, CGSize::new(0.0, 0.0))?;
    Some(Rect::new(origin.x, origin.y, size.width, size.height))
}

fn is_trusted(prompt: bool) -> bool {
    let key = CFString::new("AXTrustedCheckOptionPrompt");
    let value = if prompt {
        CFBoolean::true_value()
    } else {
        CFBoolean::false_value()
    };
    let options = CFDictionary::from_CFType_pairs(&[(key.as_CFType(), value.as_CFType())]);
    unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) }
}

fn map_ax_error(code: i32) -> ResolveError {
    match code {
        K_AX_ERROR_API_DISABLED => ResolveError::PermissionDenied,
        code => ResolveError::Platform(code),
    }
}

pub struct AxWindowSource;

impl WindowSource for AxWindowSource {
    fn windows(&self, pid: u32) -> Result<Vec<WindowInfo>, ResolveError> {
        if !is_trusted(false) {
            return Err(ResolveError::PermissionDenied);
        }
        let pid = i32::try_from(pid).map_err(|_| ResolveError::Platform(K_AX_ERROR_FAILURE))?;
        let app = Owned::new(unsafe { AXUIElementCreateApplication(pid) })
            .ok_or(ResolveError::Platform(K_AX_ERROR_FAILURE))?;

        let list = match copy_attribute(app.0, K_AX_WINDOWS_ATTRIBUTE) {
            Ok(list) => list,
            Err(K_AX_ERROR_NO_VALUE) => return Ok(Vec::new()),
            Err(code) => return Err(map_ax_error(code)),
        };

        let array = list.0 as CFArrayRef;
        let count = unsafe { CFArrayGetCount(array) };
        let mut windows = Vec::new();
        for i in 0..count {
            // Borrowed from the array; released with it.
            let window = unsafe { CFArrayGetValueAtIndex(array, i) };
            if window.is_null() {
                continue;
            }
            if let Some(frame) = window_frame(window) {
                windows.push(WindowInfo {
                    frame,
                    title: string_attribute(window, K_AX_TITLE_ATTRIBUTE),
                });
            }
        }
        Ok(windows)
    }

    fn request_access(&self) {
        if is_trusted(true) {
            return;
        }
        info!("requested accessibility permission");
    }
}

pub struct AxFocusSource;

impl FocusSource for AxFocusSource {
    fn frontmost_pid(&self) -> Option<u32> {
        let system = Owned::new(unsafe { AXUIElementCreateSystemWide() })?;
        let app = copy_attribute(system.0, K_AX_FOCUSED_APPLICATION_ATTRIBUTE).ok()?;
        let mut pid: i32 = 0;
        let code = unsafe { AXUIElementGetPid(app.0, &mut pid) };
        if code != K_AX_ERROR_SUCCESS {
            return None;
        }
        u32::try_from(pid).ok()
    }
}

pub struct CgDisplaySource;

impl DisplaySource for CgDisplaySource {
    fn displays(&self) -> Vec<Display> {
        let ids = match CGDisplay::active_displays() {
            Ok(ids) => ids,
            Err(code) => {
                debug!(code, "failed to list displays");
                return Vec::new();
            }
        };
        let main = CGDisplay::main().id;
        ids.into_iter()
            .map(|id| {
                let b = CGDisplay::new(id).bounds();
                Display {
                    id: DisplayId(id),
                    bounds: Rect::new(b.origin.x, b.origin.y, b.size.width, b.size.height),
                    is_primary: id == main,
                }
            })
            .collect()
    }
}

pub fn bundle_identifier(bundle_path: &Path) -> Option<String> {
    let url = CFURL::from_path(bundle_path, true)?;
    let bundle = CFBundle::new(url)?;
    let id = unsafe { CFBundleGetIdentifier(bundle.as_concrete_TypeRef()) };
    if id.is_null() {
        return None;
    }
    Some(unsafe { CFString::wrap_under_get_rule(id) }.to_string())
}
