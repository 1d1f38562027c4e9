natives! {
    namespace "vehicle";

    /// (primary, secondary) paint indices.
    0x40D82D88 => GET_VEHICLE_COLOURS: fn get_vehicle_colours(vehicle: handle) -> int2;
    0x57F24253 => SET_VEHICLE_COLOURS: fn set_vehicle_colours(vehicle: handle, primary: int, secondary: int);
    /// (succeeded, lights on, high beams on).
    0x7C278621 => GET_VEHICLE_LIGHTS_STATE: fn get_vehicle_lights_state(vehicle: handle) -> bool3;
    0xE8522D58 => GET_VEHICLE_NUMBER_PLATE_TEXT: fn get_vehicle_number_plate_text(vehicle: handle) -> opt_string;
    0x400F9556 => SET_VEHICLE_NUMBER_PLATE_TEXT: fn set_vehicle_number_plate_text(vehicle: handle, text: str);
}
