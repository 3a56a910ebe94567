//! Process resident-set-size sampling.
//!
//! Inline FFI on Linux and macOS keeps this dependency-free; unsupported
//! platforms report `None` and the monitor simply records no memory samples.

/// Current process RSS in megabytes, or `None` on unsupported platforms.
pub fn rss_mb() -> Option<f64> {
    rss_bytes().map(|b| b as f64 / (1024.0 * 1024.0))
}

/// Current process RSS in bytes.
///
/// - **Linux**: second field of `/proc/self/statm` (resident pages) times
///   the kernel page size from `sysconf(_SC_PAGESIZE)`.
/// - **macOS**: `task_info()` with the `MACH_TASK_BASIC_INFO` flavor.
pub fn rss_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;

        extern "C" {
            fn sysconf(name: i32) -> i64;
        }
        // _SC_PAGESIZE on Linux
        const SC_PAGESIZE: i32 = 30;
        let page_size = unsafe { sysconf(SC_PAGESIZE) };
        if page_size <= 0 {
            return None;
        }
        Some(resident_pages * page_size as u64)
    }

    #[cfg(target_os = "macos")]
    {
        type MachPort = u32;
        type KernReturn = i32;
        type NaturalT = u32;

        // MACH_TASK_BASIC_INFO (flavor 20) layout from mach/task_info.h
        #[repr(C)]
        struct MachTaskBasicInfo {
            virtual_size: u64,
            resident_size: u64,
            resident_size_max: u64,
            user_time_sec: i32,
            user_time_usec: i32,
            system_time_sec: i32,
            system_time_usec: i32,
            policy: i32,
            suspend_count: i32,
        }

        const MACH_TASK_BASIC_INFO: u32 = 20;
        const KERN_SUCCESS: KernReturn = 0;

        extern "C" {
            static mach_task_self_: MachPort;
            fn task_info(
                target_task: MachPort,
                flavor: u32,
                task_info_out: *mut MachTaskBasicInfo,
                task_info_out_cnt: *mut NaturalT,
            ) -> KernReturn;
        }

        let mut info = unsafe { std::mem::zeroed::<MachTaskBasicInfo>() };
        let mut count =
            (std::mem::size_of::<MachTaskBasicInfo>() / std::mem::size_of::<NaturalT>()) as NaturalT;
        let ret =
            unsafe { task_info(mach_task_self_, MACH_TASK_BASIC_INFO, &mut info, &mut count) };
        (ret == KERN_SUCCESS).then_some(info.resident_size)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}
