use std::ffi::CStr;
use std::fmt;
use std::os::raw::c_int;

/// A raw, unclassified return code from an `mdb_*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MdbError(c_int);

impl MdbError {
    pub fn code(self) -> c_int {
        self.0
    }

    pub fn not_found(self) -> bool {
        self.0 == lmdb_rkv_sys::MDB_NOTFOUND
    }

    pub fn map_full(self) -> bool {
        self.0 == lmdb_rkv_sys::MDB_MAP_FULL
    }

    pub fn bad_rslot(self) -> bool {
        self.0 == lmdb_rkv_sys::MDB_BAD_RSLOT
    }
}

impl fmt::Display for MdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = unsafe {
            let ptr = super::ffi::mdb_strerror(self.0);
            if ptr.is_null() {
                return write!(f, "lmdb error {}", self.0);
            }
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        };
        write!(f, "{msg}")
    }
}

impl std::error::Error for MdbError {}

/// Classify a raw LMDB return code: `0` is success, anything else is an
/// error. Called around every `ffi::mdb_*` invocation, mirroring the
/// convention every LMDB binding in this corpus follows.
pub fn mdb_result(code: c_int) -> Result<(), MdbError> {
    if code == 0 {
        Ok(())
    } else {
        Err(MdbError(code))
    }
}
