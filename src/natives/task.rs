natives! {
    namespace "task";

    0x80A9E7A7 => TASK_GO_STRAIGHT_TO_COORD: fn task_go_straight_to_coord(
        ped: handle,
        target: vec3,
        speed: float,
        timeout: int,
        heading: float,
        distance_to_slide: float,
    );
    0xDE3316AB => CLEAR_PED_TASKS: fn clear_ped_tasks(ped: handle);
    0x65D4A35D => TASK_WARP_PED_INTO_VEHICLE: fn task_warp_ped_into_vehicle(ped: handle, vehicle: handle, seat: int);
}
