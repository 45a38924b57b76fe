use esp_idf_svc::hal::task::thread::ThreadSpawnConfiguration;
use esp_idf_svc::sys;
use stripview_core::HeapGauge;

const TELEMETRY_THREAD_STACK_BYTES: usize = 6 * 1024;

/// Log heap usage statistics and current task stack headroom.
pub fn log_heap(label: &str) {
    let free_heap = unsafe { sys::esp_get_free_heap_size() };
    let min_free = unsafe { sys::esp_get_minimum_free_heap_size() };
    let free_8bit = unsafe { sys::heap_caps_get_free_size(sys::MALLOC_CAP_8BIT) };
    let largest_8bit = unsafe { sys::heap_caps_get_largest_free_block(sys::MALLOC_CAP_8BIT) };
    let stack_hwm_words = unsafe { sys::uxTaskGetStackHighWaterMark(core::ptr::null_mut()) };
    let stack_hwm_bytes = (stack_hwm_words as usize) * core::mem::size_of::<sys::StackType_t>();
    log::info!(
        "[MEM] {}: free={} min_free={} free_8bit={} largest_8bit={} stack_hwm={}B",
        label,
        free_heap,
        min_free,
        free_8bit,
        largest_8bit,
        stack_hwm_bytes
    );
}

/// Heap figures straight from the IDF allocator
#[derive(Debug, Clone, Copy, Default)]
pub struct EspHeap;

impl HeapGauge for EspHeap {
    fn free_heap(&self) -> usize {
        unsafe { sys::heap_caps_get_free_size(sys::MALLOC_CAP_8BIT) }
    }

    fn largest_free_block(&self) -> usize {
        unsafe { sys::heap_caps_get_largest_free_block(sys::MALLOC_CAP_8BIT) }
    }
}

/// Minimum free heap since boot
pub fn min_free_heap() -> u32 {
    unsafe { sys::esp_get_minimum_free_heap_size() }
}

/// Microseconds since boot, as milliseconds
pub fn uptime_ms() -> u64 {
    (unsafe { sys::esp_timer_get_time() } / 1_000) as u64
}

/// Configure pthread defaults used by `std::thread` workers on ESP-IDF.
pub fn configure_pthread_defaults() {
    let mut config = ThreadSpawnConfiguration::default();
    config.stack_size = TELEMETRY_THREAD_STACK_BYTES;
    config.priority = 1;
    config.inherit = false;

    if let Err(err) = config.set() {
        log::warn!("Failed to configure pthread defaults: {}", err);
    } else {
        log::info!(
            "Configured pthread defaults: stack_size={} priority={}",
            config.stack_size,
            config.priority
        );
    }
}
