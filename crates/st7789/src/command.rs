// ST7789V2 command definitions

// System
pub const SOFT_RESET: u8 = 0x01; // Software reset
pub const SLEEP_IN: u8 = 0x10; // Enter sleep mode
pub const SLEEP_OUT: u8 = 0x11; // Exit sleep mode
pub const INVERSION_OFF: u8 = 0x20; // Display inversion off
pub const INVERSION_ON: u8 = 0x21; // Display inversion on
pub const DISPLAY_OFF: u8 = 0x28; // Display off
pub const DISPLAY_ON: u8 = 0x29; // Display on

// Addressing and memory
pub const COLUMN_ADDRESS_SET: u8 = 0x2A; // CASET
pub const ROW_ADDRESS_SET: u8 = 0x2B; // RASET
pub const MEMORY_WRITE: u8 = 0x2C; // RAMWR
pub const MEMORY_DATA_ACCESS_CONTROL: u8 = 0x36; // MADCTL
pub const INTERFACE_PIXEL_FORMAT: u8 = 0x3A; // COLMOD

// Panel tuning (values from the module vendor's init sequence)
pub const PORCH_CONTROL: u8 = 0xB2; // PORCTRL
pub const GATE_CONTROL: u8 = 0xB7; // GCTRL
pub const VCOM_SETTING: u8 = 0xBB; // VCOMS
pub const LCM_CONTROL: u8 = 0xC0; // LCMCTRL
pub const VDV_VRH_ENABLE: u8 = 0xC2; // VDVVRHEN
pub const VRH_SET: u8 = 0xC3; // VRHS
pub const VDV_SET: u8 = 0xC4; // VDVS
pub const FRAME_RATE_CONTROL: u8 = 0xC6; // FRCTRL2
pub const POWER_CONTROL_1: u8 = 0xD0; // PWCTRL1
pub const POWER_CONTROL_EXTRA: u8 = 0xD6; // undocumented, vendor sample
pub const POSITIVE_GAMMA: u8 = 0xE0; // PVGAMCTRL
pub const NEGATIVE_GAMMA: u8 = 0xE1; // NVGAMCTRL
pub const GATE_CONTROL_EXTRA: u8 = 0xE4; // GATECTRL

// MADCTL bits
pub const MADCTL_MY: u8 = 0x80; // Row address order
pub const MADCTL_MX: u8 = 0x40; // Column address order
pub const MADCTL_MV: u8 = 0x20; // Row/column exchange
pub const MADCTL_BGR: u8 = 0x08; // BGR panel order

// COLMOD: 16 bits per pixel, 65K colors
pub const COLMOD_RGB565: u8 = 0x05;
