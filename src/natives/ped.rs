natives! {
    namespace "ped";

    0x2CE311A7 => GET_PED_ARMOUR: fn get_ped_armour(ped: handle) -> int;
    0x4E3A0CC4 => SET_PED_ARMOUR: fn set_ped_armour(ped: handle, amount: int);
    /// Returns [`crate::handle::Handle::NONE`] when the ped is on foot.
    0xAFE92319 => GET_VEHICLE_PED_IS_IN: fn get_vehicle_ped_is_in(ped: handle, last_vehicle: bool) -> handle;
}
