//! Host-side COM objects handed to plugins: the host application context,
//! the component handler, and an in-memory `IBStream`.

use std::ffi::{c_char, c_void};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use vst3::Class;
use vst3::Steinberg::IBStream_::IStreamSeekMode_::{kIBSeekCur, kIBSeekEnd, kIBSeekSet};
use vst3::Steinberg::Vst::{
    IComponentHandler, IComponentHandlerTrait, IHostApplication, IHostApplicationTrait, ParamID,
    ParamValue, String128, TChar,
};
use vst3::Steinberg::{
    int32, int64, kInvalidArgument, kNoInterface, kResultFalse, kResultOk, tresult, IBStream,
    IBStreamTrait, TUID,
};

pub const HOST_NAME_ENV: &str = "SYNTH_PROBE_HOST_NAME";
const DEFAULT_HOST_NAME: &str = "synth-probe";

pub fn string128_to_string(s: &[TChar]) -> String {
    let end = s.iter().position(|&c| c == 0).unwrap_or(s.len());
    String::from_utf16_lossy(&s[..end]).trim().to_string()
}

pub fn char_array_to_string(s: &[c_char]) -> String {
    let end = s.iter().position(|&c| c == 0).unwrap_or(s.len());
    let bytes: Vec<u8> = s[..end].iter().map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).trim().to_string()
}

/// Writes `src` as NUL-terminated UTF-16, truncating to fit.
pub fn copy_wstring(src: &str, dst: &mut [TChar]) {
    if dst.is_empty() {
        return;
    }
    let cap = dst.len() - 1;
    let mut len = 0;
    for (ch, slot) in src.encode_utf16().zip(dst.iter_mut().take(cap)) {
        *slot = ch;
        len += 1;
    }
    dst[len] = 0;
}

pub struct HostApplication {
    name: String,
}

impl HostApplication {
    pub fn from_env() -> Self {
        let name = std::env::var(HOST_NAME_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST_NAME.to_string());
        Self { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Class for HostApplication {
    type Interfaces = (IHostApplication,);
}

impl IHostApplicationTrait for HostApplication {
    unsafe fn getName(&self, name: *mut String128) -> tresult {
        if name.is_null() {
            return kInvalidArgument;
        }
        let buf: &mut String128 = &mut *name;
        copy_wstring(&self.name, &mut buf[..]);
        kResultOk
    }

    unsafe fn createInstance(
        &self,
        _cid: *mut TUID,
        _iid: *mut TUID,
        obj: *mut *mut c_void,
    ) -> tresult {
        if !obj.is_null() {
            *obj = std::ptr::null_mut();
        }
        kNoInterface
    }
}

/// Receives edits made in the plugin editor. Values are re-read from the
/// controller afterwards, so edits are only logged.
pub struct ComponentHandler;

impl Class for ComponentHandler {
    type Interfaces = (IComponentHandler,);
}

impl IComponentHandlerTrait for ComponentHandler {
    unsafe fn beginEdit(&self, id: ParamID) -> tresult {
        log::trace!("beginEdit {id}");
        kResultOk
    }

    unsafe fn performEdit(&self, id: ParamID, value_normalized: ParamValue) -> tresult {
        log::debug!("performEdit {id} -> {value_normalized:.6}");
        kResultOk
    }

    unsafe fn endEdit(&self, id: ParamID) -> tresult {
        log::trace!("endEdit {id}");
        kResultOk
    }

    unsafe fn restartComponent(&self, flags: int32) -> tresult {
        log::debug!("Plugin requested restartComponent (flags={flags:#x})");
        kResultOk
    }
}

/// Growable in-memory `IBStream`.
pub struct MemoryStream {
    inner: Mutex<Cursor<Vec<u8>>>,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::with_data(Vec::new())
    }

    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            inner: Mutex::new(Cursor::new(data)),
        }
    }

    pub fn data(&self) -> Vec<u8> {
        self.inner
            .lock()
            .map(|cursor| cursor.get_ref().clone())
            .unwrap_or_default()
    }

    pub fn rewind(&self) {
        if let Ok(mut cursor) = self.inner.lock() {
            cursor.set_position(0);
        }
    }
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Class for MemoryStream {
    type Interfaces = (IBStream,);
}

impl IBStreamTrait for MemoryStream {
    unsafe fn read(&self, buffer: *mut c_void, num_bytes: int32, num_bytes_read: *mut int32) -> tresult {
        if buffer.is_null() || num_bytes < 0 {
            return kInvalidArgument;
        }
        let Ok(mut cursor) = self.inner.lock() else {
            return kResultFalse;
        };

        let out = std::slice::from_raw_parts_mut(buffer as *mut u8, num_bytes as usize);
        let n = cursor.read(out).unwrap_or(0);
        if !num_bytes_read.is_null() {
            *num_bytes_read = n as int32;
        }
        kResultOk
    }

    unsafe fn write(
        &self,
        buffer: *mut c_void,
        num_bytes: int32,
        num_bytes_written: *mut int32,
    ) -> tresult {
        if buffer.is_null() || num_bytes < 0 {
            return kInvalidArgument;
        }
        let Ok(mut cursor) = self.inner.lock() else {
            return kResultFalse;
        };

        let data = std::slice::from_raw_parts(buffer as *const u8, num_bytes as usize);
        if cursor.write_all(data).is_err() {
            return kResultFalse;
        }
        if !num_bytes_written.is_null() {
            *num_bytes_written = num_bytes;
        }
        kResultOk
    }

    unsafe fn seek(&self, pos: int64, mode: int32, result: *mut int64) -> tresult {
        let target = match mode {
            m if m == kIBSeekSet as int32 => {
                if pos < 0 {
                    return kInvalidArgument;
                }
                SeekFrom::Start(pos as u64)
            }
            m if m == kIBSeekCur as int32 => SeekFrom::Current(pos),
            m if m == kIBSeekEnd as int32 => SeekFrom::End(pos),
            _ => return kInvalidArgument,
        };
        let Ok(mut cursor) = self.inner.lock() else {
            return kResultFalse;
        };

        match cursor.seek(target) {
            Ok(new_pos) => {
                if !result.is_null() {
                    *result = new_pos as int64;
                }
                kResultOk
            }
            Err(_) => kInvalidArgument,
        }
    }

    unsafe fn tell(&self, pos: *mut int64) -> tresult {
        if pos.is_null() {
            return kInvalidArgument;
        }
        let Ok(cursor) = self.inner.lock() else {
            return kResultFalse;
        };
        *pos = cursor.position() as int64;
        kResultOk
    }
}
